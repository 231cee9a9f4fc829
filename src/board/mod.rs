//! Stock board: a drag-and-drop Kanban of stock items shared as one document.
//!
//! | Module       | Role                                                         |
//! |--------------|--------------------------------------------------------------|
//! | `models`     | Card, column, category and view types                        |
//! | `registry`   | Per-column ordered card collection with filtered views       |
//! | `gesture`    | Drag event interpretation and drop-marker geometry           |
//! | `reducer`    | Move/add/edit/delete applied to the registry                 |
//! | `store`      | `DocumentStore` trait, in-memory store, push subscriptions   |
//! | `db`         | SQLite-backed `DocumentStore`                                |
//! | `auth`       | Signed-in user provider                                      |
//! | `sync`       | Fetch/subscribe/save of the shared card list                 |
//! | `controller` | Session state machine wiring all of the above                |
//! | `seed`       | Dummy card generation                                        |
//! | `api`, `ws`, `server` | HTTP and WebSocket host for the shared document     |

pub mod api;
pub mod auth;
pub mod controller;
pub mod db;
pub mod gesture;
pub mod models;
pub mod reducer;
pub mod registry;
pub mod seed;
pub mod server;
pub mod store;
pub mod sync;
pub mod ws;
