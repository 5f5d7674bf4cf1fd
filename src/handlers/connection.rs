//! Connection handling for client connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::constants::*;
use crate::game::ClientSession;
use crate::protocol::{decode_packet, encode_packet, Outgoing, Packet};
use crate::Server;

use super::{chapter, elite, join};

/// How often an idle connection re-checks its timeout
const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Handle a client connection.
pub async fn handle_connection(mut socket: TcpStream, addr: SocketAddr, server: Arc<Server>) -> Result<()> {
    let ip = addr.ip().to_string();
    let connection_id = server.next_connection_id();
    info!("New connection {} from {}", connection_id, addr);

    server.add_ip_connection(&ip);

    let session = Arc::new(RwLock::new(ClientSession::new(
        connection_id,
        ip.clone(),
        server.config.server.network.connection_timeout_secs,
    )));
    let session_id = session.read().await.session_id;
    server.sessions.insert(session_id, session.clone());

    let result = handle_client_messages(&mut socket, &addr, &server, session.clone()).await;

    cleanup_session(&server, &session).await;
    // The stale-connection sweep may already have released this one
    if server.sessions.remove(&session_id).is_some() {
        server.remove_ip_connection(&ip);
    }

    info!("Connection {} closed from {}", connection_id, addr);
    result
}

/// Main packet loop for a client.
///
/// Several packets may arrive in one read; they are handled in order and each
/// response echoes the index of its request. Any handler error closes the
/// connection without a reply.
async fn handle_client_messages(
    socket: &mut TcpStream,
    addr: &SocketAddr,
    server: &Arc<Server>,
    session: Arc<RwLock<ClientSession>>,
) -> Result<()> {
    let max_message_size = server.config.server.network.max_message_size;
    let mut recv_buffer = BytesMut::with_capacity(4096);
    let mut temp_buf = [0u8; 4096];

    let mut timeout_check = tokio::time::interval(TIMEOUT_CHECK_INTERVAL);
    timeout_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    timeout_check.tick().await;

    loop {
        tokio::select! {
            _ = timeout_check.tick() => {
                if session.read().await.is_timed_out() {
                    warn!("Connection timed out for {}", addr);
                    return Ok(());
                }
            }

            read_result = socket.read(&mut temp_buf) => {
                let n = match read_result {
                    Ok(0) => {
                        debug!("Client {} disconnected", addr);
                        return Ok(());
                    }
                    Ok(n) => n,
                    Err(e) => {
                        error!("Read error from {}: {}", addr, e);
                        return Err(e.into());
                    }
                };

                recv_buffer.extend_from_slice(&temp_buf[..n]);
                session.write().await.update_activity();

                while let Some(packet) = decode_packet(&mut recv_buffer, max_message_size)
                    .with_context(|| format!("bad frame from {}", addr))?
                {
                    debug!("Packet {} (index {}) with {} bytes", packet.id, packet.index, packet.payload.len());

                    let responses = handle_packet(&packet, server, session.clone())
                        .await
                        .with_context(|| format!("message {} from {}", packet.id, addr))?;

                    for response in &responses {
                        send_message(socket, response, packet.index).await?;
                    }
                }
            }
        }
    }
}

/// Route one packet to its handler.
async fn handle_packet(
    packet: &Packet,
    server: &Arc<Server>,
    session: Arc<RwLock<ClientSession>>,
) -> Result<Vec<Outgoing>> {
    let payload = packet.payload.as_slice();
    match packet.id {
        MSG_CS_JOIN_SERVER => join::handle_join_server(payload, server, session).await,
        MSG_CS_CHAPTER_TRACKING => chapter::handle_chapter_tracking(payload, server, session).await,
        MSG_CS_CHAPTER_OP => chapter::handle_chapter_op(payload, server, session).await,
        MSG_CS_CHAPTER_BATTLE_RESULT => chapter::handle_battle_result(payload, server, session).await,
        MSG_CS_REMOVE_ELITE_SHIP => elite::handle_remove_elite_target_ship(payload, server, session).await,
        _ => {
            debug!("Unhandled message id: {}", packet.id);
            Ok(vec![])
        }
    }
}

/// Frame and send one response.
pub async fn send_message(socket: &mut TcpStream, message: &Outgoing, index: u16) -> Result<()> {
    let frame = encode_packet(message.id, index, &message.payload)?;
    socket.write_all(&frame).await?;
    socket.flush().await?;
    Ok(())
}

/// Release the commander binding of a closing connection.
async fn cleanup_session(server: &Arc<Server>, session: &Arc<RwLock<ClientSession>>) {
    let session_guard = session.read().await;
    if let Some(commander_id) = session_guard.commander_id {
        server.online.unbind(commander_id, session_guard.session_id);
        info!(
            "Commander {} disconnected after {}s",
            commander_id,
            session_guard.connected_at.elapsed().as_secs()
        );
    }
}
