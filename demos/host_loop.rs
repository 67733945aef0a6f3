//! Host Loop - a stand-in game server driving a session.
//!
//! This example demonstrates:
//! - Loading the session configuration from JSON
//! - Exposing host natives through the [`Host`] trait
//! - Ticking the session and forwarding callbacks through a shared handle
//!
//! # Running
//!
//! ```text
//! cargo run --example host_loop -- '{ "debug": { "enabled": false } }'
//! ```
//!
//! Then connect a remote runtime to `/tmp/scriptwire.sock`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use scriptwire_host::config::PipeConfig;
use scriptwire_host::{
    CallbackParam, Host, Native, PipeChannel, SessionBuilder, SessionConfig, SharedSession,
};

/// A server with a handful of players and two natives.
struct DemoServer {
    natives: HashMap<&'static str, Arc<dyn Native>>,
}

fn get_max_players(_args: &[u8]) -> scriptwire_host::Result<Vec<u8>> {
    Ok(50i32.to_le_bytes().to_vec())
}

fn set_player_health(args: &[u8]) -> scriptwire_host::Result<Vec<u8>> {
    println!("SetPlayerHealth({} argument bytes)", args.len());
    Ok(1i32.to_le_bytes().to_vec())
}

impl DemoServer {
    fn new() -> Self {
        let mut natives: HashMap<&'static str, Arc<dyn Native>> = HashMap::new();
        natives.insert("GetMaxPlayers", Arc::new(get_max_players));
        natives.insert("SetPlayerHealth", Arc::new(set_player_health));
        Self { natives }
    }
}

impl Host for DemoServer {
    fn find_native(&self, name: &str) -> Option<Arc<dyn Native>> {
        self.natives.get(name).cloned()
    }

    fn exec_command(&mut self, command: &str) {
        println!("console: {}", command);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(json) => SessionConfig::from_json_str(&json)?,
        None => SessionConfig::default(),
    };

    let channel = PipeChannel::new(PipeConfig::default())?;
    println!("Waiting for a remote on {}", channel.path());

    let session = SessionBuilder::new()
        .config(config)
        .build(channel, DemoServer::new());
    let session = SharedSession::new(session);

    session.public_call(0, "OnGameModeInit", &[]);

    // 20 ticks per second; a player connects every ten seconds.
    for tick in 0u64.. {
        session.tick();
        if tick % 200 == 199 {
            let playerid = (tick / 200) as i32;
            let ret = session.public_call(0, "OnPlayerConnect", &[CallbackParam::Int(playerid)]);
            println!("OnPlayerConnect({}) -> {:?}", playerid, ret);
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    Ok(())
}
