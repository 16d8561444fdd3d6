//! Well-known channel names shared across the robot's processes.
//!
//! Every process on the bus must agree on these strings; changing one is
//! a wire-protocol change for the whole system.

/// Periodic time reference from the time-sync broadcaster.
pub const TIMESYNC_CHANNEL: &str = "MBOT_TIMESYNC";

/// Robot status heartbeat.
pub const STATUS_CHANNEL: &str = "MBOT_STATUS";

/// Raw IMU readings.
pub const IMU_CHANNEL: &str = "MBOT_IMU";

/// Wheel encoder counts.
pub const ENCODERS_CHANNEL: &str = "MBOT_ENCODERS";

/// Laser scans.
pub const LIDAR_CHANNEL: &str = "LIDAR";

/// Dead-reckoned pose estimates.
pub const ODOMETRY_CHANNEL: &str = "ODOMETRY";

/// Motor velocity commands.
pub const MOTOR_COMMAND_CHANNEL: &str = "MBOT_MOTOR_COMMAND";

/// Command acknowledgments from the embedded controller.
pub const MESSAGE_CONFIRMATION_CHANNEL: &str = "MSG_CONFIRM";
