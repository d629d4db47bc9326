// Library exports for the simulated replay robots

pub mod arm;
pub mod floating;
pub mod kinematics;
pub mod robot_config;
pub mod scene;

pub use arm::{SimulatedArm, HOME_JOINTS};
pub use floating::{FloatingGripper, Workspace};
pub use kinematics::CrxKinematics;
pub use robot_config::{ArmConfig, ControlParams, RobotModel};
pub use scene::{CameraSet, SceneCamera};
