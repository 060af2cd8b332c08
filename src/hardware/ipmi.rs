//! IPMI fan control: the ipmitool channel and the retrying session around it.

pub mod ipmitool;
pub mod session;

pub use ipmitool::IpmiTool;
pub use session::{Ipmi, SessionSettings};
