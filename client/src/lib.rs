//! # Minesweeper Client Library
//!
//! Client-side synchronization for a shared minesweeper board. Many players
//! click on one board held by the server; this crate keeps a local copy of that
//! board and its scoreboard in step with the server and turns clicks into
//! actions on the wire.
//!
//! ## Architecture Overview
//!
//! The server is the only authority. The client never predicts: a click is sent
//! as an action and nothing changes locally until the server's answer arrives.
//!
//! ### Transport
//! A single WebSocket connection that heals itself. Received frames are queued
//! raw; when the connection drops a new attempt is made after a fixed delay
//! until the owner shuts the channel down.
//!
//! ### Reconciliation
//! Once per frame the queued messages are decoded and applied in arrival order
//! to the board and roster replicas. Messages that cannot be decoded are logged
//! and skipped.
//!
//! ## Module Organization
//!
//! - `config`: server address, token, reconnect delay
//! - `transport`: connection lifecycle and the [`transport::Connector`] seam
//! - `queue`: inbound frame buffer shared by the transport and the reconciler
//! - `board` / `roster`: local replicas of server state
//! - `reconcile`: batch application of server events
//! - `session`: [`session::GameClient`], the facade the UI talks to
//! - `input` / `rendering`: macroquad front end
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::session::GameClient;
//! use client::transport::WsConnector;
//!
//! # async fn run() -> Result<(), client::transport::TransportError> {
//! let mut game = GameClient::new(ClientConfig::default().with_token("jwt"), WsConnector)?;
//! game.start();
//!
//! loop {
//!     game.tick();
//!     if let Some(board) = game.board() {
//!         println!("{} cells left", board.cells_remaining());
//!     }
//!     game.reveal(3, 4);
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod config;
pub mod input;
pub mod queue;
pub mod reconcile;
pub mod rendering;
pub mod roster;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;
