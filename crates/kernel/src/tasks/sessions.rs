// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Connection-side state as the scheduler sees it. Output is buffered per
//! connection and flushed at task boundaries; the network writer thread on
//! the far side of the `outbound` channel owns the socket.

use barn_var::Obj;
use std::collections::HashMap;
use std::time::SystemTime;

/// What the scheduler sends the per-connection writer thread.
#[derive(Debug, Clone)]
pub enum ConnectionOut {
    Line(Vec<u8>),
    /// Close the socket after draining.
    Disconnect,
}

pub struct Connection {
    pub id: i64,
    pub player: Option<Obj>,
    pub peer_name: String,
    pub outbound: flume::Sender<ConnectionOut>,
    /// Lines awaiting the next flush.
    pub buffer: Vec<Vec<u8>>,
    pub connected_at: SystemTime,
    pub last_activity: SystemTime,
    /// A task blocked in `read()` on this connection, if any.
    pub reading_task: Option<i64>,
    /// Marked by `boot_player`; the scheduler disconnects at the boundary.
    pub booted: bool,
}

/// First connection id; they count downward. `#-1`..`#-3` are reserved
/// sentinels.
const FIRST_CONNECTION_ID: i64 = -4;

#[derive(Default)]
pub struct Connections {
    conns: HashMap<i64, Connection>,
    next_id: i64,
}

impl Connections {
    pub fn new() -> Self {
        Self {
            conns: HashMap::new(),
            next_id: FIRST_CONNECTION_ID,
        }
    }

    pub fn register(&mut self, peer_name: String, outbound: flume::Sender<ConnectionOut>) -> i64 {
        let id = self.next_id;
        self.next_id -= 1;
        self.conns.insert(
            id,
            Connection {
                id,
                player: None,
                peer_name,
                outbound,
                buffer: vec![],
                connected_at: SystemTime::now(),
                last_activity: SystemTime::now(),
                reading_task: None,
                booted: false,
            },
        );
        id
    }

    pub fn remove(&mut self, id: i64) -> Option<Connection> {
        self.conns.remove(&id)
    }

    pub fn get(&self, id: i64) -> Option<&Connection> {
        self.conns.get(&id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut Connection> {
        self.conns.get_mut(&id)
    }

    pub fn ids(&self) -> Vec<i64> {
        self.conns.keys().copied().collect()
    }

    /// The connection currently associated with a player object.
    pub fn for_player(&self, player: Obj) -> Option<&Connection> {
        self.conns.values().find(|c| c.player == Some(player))
    }

    pub fn for_player_mut(&mut self, player: Obj) -> Option<&mut Connection> {
        self.conns.values_mut().find(|c| c.player == Some(player))
    }

    /// The "session id" MOO code sees for a player: the player object if
    /// logged in, else the negative connection id itself.
    pub fn session_obj(conn: &Connection) -> Obj {
        conn.player.unwrap_or(Obj(conn.id))
    }

    /// Resolve a MOO-side object (player or negative connection id) to a
    /// connection id.
    pub fn resolve(&self, who: Obj) -> Option<i64> {
        if who.0 < 0 {
            return self.conns.contains_key(&who.0).then_some(who.0);
        }
        self.for_player(who).map(|c| c.id)
    }

    /// Append a line to a connection's output buffer.
    pub fn push_output(&mut self, conn_id: i64, line: Vec<u8>) {
        if let Some(c) = self.conns.get_mut(&conn_id) {
            c.buffer.push(line);
        }
    }

    /// Drain one connection's buffer to its writer.
    pub fn flush(&mut self, conn_id: i64) {
        if let Some(c) = self.conns.get_mut(&conn_id) {
            for line in c.buffer.drain(..) {
                // A dead writer just means the socket has gone; the
                // disconnect event will arrive shortly.
                let _ = c.outbound.send(ConnectionOut::Line(line));
            }
        }
    }

    pub fn flush_all(&mut self) {
        let ids = self.ids();
        for id in ids {
            self.flush(id);
        }
    }

    pub fn connected_players(&self) -> Vec<Obj> {
        self.conns
            .values()
            .filter_map(|c| c.player)
            .collect()
    }
}
