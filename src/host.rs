//! Host boundary.
//!
//! The embedding game server implements [`Host`] to expose its native
//! functions and command console. Natives take and return opaque cell
//! buffers; the remote side knows their signatures, the bridge does not.

use std::sync::Arc;

use crate::error::Result;

/// A native function exposed by the host.
pub trait Native: Send + Sync {
    /// Run the native on marshalled arguments and return marshalled results.
    fn invoke(&self, args: &[u8]) -> Result<Vec<u8>>;
}

impl<F> Native for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync,
{
    fn invoke(&self, args: &[u8]) -> Result<Vec<u8>> {
        self(args)
    }
}

/// The embedding host.
pub trait Host {
    /// Look a native up by name.
    fn find_native(&self, name: &str) -> Option<Arc<dyn Native>>;

    /// Run a console command (e.g. `gmx` to restart the game mode).
    fn exec_command(&mut self, command: &str);
}

/// Representative host events and their callback marshalling.
pub mod events {
    use crate::handler::CallbackParam;

    /// Weapon fire, delivered as `OnPlayerWeaponShot`.
    ///
    /// The remote may cancel the shot by returning 0.
    #[derive(Debug, Clone, PartialEq)]
    pub struct WeaponShot {
        pub player_id: i32,
        pub weapon: i32,
        pub hit_type: i32,
        pub hit_id: i32,
        pub position: [f32; 3],
        pub prevent_default: bool,
    }

    impl WeaponShot {
        pub const CALLBACK: &'static str = "OnPlayerWeaponShot";

        pub fn params(&self) -> Vec<CallbackParam> {
            vec![
                CallbackParam::Int(self.player_id),
                CallbackParam::Int(self.weapon),
                CallbackParam::Int(self.hit_type),
                CallbackParam::Int(self.hit_id),
                CallbackParam::Float(self.position[0]),
                CallbackParam::Float(self.position[1]),
                CallbackParam::Float(self.position[2]),
            ]
        }

        /// Apply the value returned by the remote handler.
        ///
        /// No value leaves the event untouched.
        pub fn apply_result(&mut self, value: Option<i32>) {
            if let Some(value) = value {
                self.prevent_default = value == 0;
            }
        }
    }
}
