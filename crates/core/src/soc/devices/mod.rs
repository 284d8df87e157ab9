pub mod syscon;
pub mod uart;

pub use syscon::SysCon;
pub use uart::Uart;
