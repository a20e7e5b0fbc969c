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

//! The TCP edge: an accept loop, then one reader and one writer thread per
//! connection, speaking to the scheduler over channels. Nothing here touches
//! the world state.

use barn_kernel::builtins::bytes_to_binary;
use barn_kernel::{ConnectionOut, SchedulerMessage};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tracing::{info, warn};

pub fn spawn_listener(
    port: u16,
    scheduler_tx: flume::Sender<SchedulerMessage>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    info!("listening on port {port}");
    thread::Builder::new()
        .name("accept".to_string())
        .spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => spawn_connection(stream, scheduler_tx.clone()),
                    Err(e) => warn!("accept failed: {e}"),
                }
            }
        })?;
    Ok(())
}

fn spawn_connection(stream: TcpStream, scheduler_tx: flume::Sender<SchedulerMessage>) {
    let peer = stream
        .peer_addr()
        .map(|a| format!("port {} from {}", a.port(), a.ip()))
        .unwrap_or_else(|_| "unknown".to_string());

    let (out_tx, out_rx) = flume::unbounded::<ConnectionOut>();
    let (reply_tx, reply_rx) = flume::bounded(1);
    if scheduler_tx
        .send(SchedulerMessage::Connected {
            peer,
            outbound: out_tx,
            reply: reply_tx,
        })
        .is_err()
    {
        return;
    }
    let Ok(conn_id) = reply_rx.recv() else {
        return;
    };

    // Writer: drain the scheduler's buffered lines to the socket.
    let write_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!("could not clone stream: {e}");
            return;
        }
    };
    let _ = thread::Builder::new()
        .name(format!("conn{conn_id}-write"))
        .spawn(move || {
            let mut stream = write_stream;
            for msg in out_rx.iter() {
                match msg {
                    ConnectionOut::Line(mut bytes) => {
                        bytes.push(b'\n');
                        if stream.write_all(&bytes).is_err() {
                            break;
                        }
                    }
                    ConnectionOut::Disconnect => break,
                }
            }
            let _ = stream.shutdown(std::net::Shutdown::Both);
        });

    // Reader: CR/LF/CRLF-tolerant lines; bytes that aren't text arrive as
    // MOO binary strings.
    let _ = thread::Builder::new()
        .name(format!("conn{conn_id}-read"))
        .spawn(move || {
            let mut reader = BufReader::new(stream);
            loop {
                let mut buf = Vec::new();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
                    buf.pop();
                }
                let line = match String::from_utf8(buf) {
                    Ok(s) => s,
                    Err(e) => bytes_to_binary(e.as_bytes()),
                };
                if scheduler_tx
                    .send(SchedulerMessage::Line { conn_id, line })
                    .is_err()
                {
                    return;
                }
            }
            let _ = scheduler_tx.send(SchedulerMessage::Disconnected { conn_id });
        });
}
