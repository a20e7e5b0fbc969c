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

use barn_db::{ObjPtr, ObjectStore};
use barn_var::{Symbol, Variant, SYSTEM_OBJECT};
use tracing::warn;

/// Server tunables, seeded from defaults and overridden by
/// `#0.server_options` at startup and on `load_server_options()`.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    /// Tick budget for foreground (command/eval) tasks.
    pub fg_ticks: u64,
    /// Tick budget for forked and suspended-resumed tasks.
    pub bg_ticks: u64,
    pub fg_seconds: f64,
    pub bg_seconds: f64,
    /// Seconds between automatic checkpoints.
    pub dump_interval: u64,
    pub max_stack_depth: usize,
    pub name_lookup_timeout: u64,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            fg_ticks: 300_000,
            bg_ticks: 150_000,
            fg_seconds: 5.0,
            bg_seconds: 3.0,
            dump_interval: 3600,
            max_stack_depth: 50,
            name_lookup_timeout: 5,
        }
    }
}

impl ServerOptions {
    /// Re-read `#0.server_options`. Unknown keys are ignored with a warning;
    /// a missing property leaves the defaults in place.
    pub fn reload(&mut self, world: &ObjectStore) {
        *self = Self::default();
        let Ok((options, _, _)) =
            world.resolve_property(ObjPtr::Num(SYSTEM_OBJECT), Symbol::mk("server_options"))
        else {
            return;
        };
        let Variant::Map(options) = options.variant() else {
            // A property-bag object would also be legal in the reference;
            // barn reads the map form.
            return;
        };
        for (k, v) in options.iter() {
            let Variant::Str(key) = k.variant() else {
                continue;
            };
            let int_val = match v.variant() {
                Variant::Int(i) => Some(*i),
                _ => None,
            };
            let Some(i) = int_val else { continue };
            match key.to_text().to_ascii_lowercase().as_str() {
                "fg_ticks" => self.fg_ticks = i.max(1) as u64,
                "bg_ticks" => self.bg_ticks = i.max(1) as u64,
                "fg_seconds" => self.fg_seconds = i.max(1) as f64,
                "bg_seconds" => self.bg_seconds = i.max(1) as f64,
                "dump_interval" | "checkpoint_interval" => self.dump_interval = i.max(60) as u64,
                "max_stack_depth" => self.max_stack_depth = i.max(10) as usize,
                "name_lookup_timeout" => self.name_lookup_timeout = i.max(0) as u64,
                other => warn!("unrecognized server option: {other}"),
            }
        }
    }
}
