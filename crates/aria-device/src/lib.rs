//! # aria-device
//!
//! Phone control for the Aria agent.
//!
//! - **Automation protocol**: a line-delimited JSON server ([`AutomationServer`])
//!   that answers named UI commands through a [`CommandDispatcher`], and the
//!   matching host-side [`AutomationClient`]
//! - **UI sources**: the injectable [`UiSource`] capability, its bound/unbound
//!   [`UiSourceHandle`], and an ADB-backed implementation ([`AdbUiSource`])
//! - **Snapshots**: flat, ordered element lists with generation-checked node ids
//! - **Tools**: the phone tools the agent calls ([`DeviceTools`])

pub mod adb_source;
pub mod android;
pub mod client;
pub mod dispatcher;
pub mod protocol;
pub mod server;
pub mod snapshot;
pub mod source;
pub mod tools;

pub use adb_source::AdbUiSource;
pub use android::{AndroidBridge, AndroidDevice, Contact};
pub use client::AutomationClient;
pub use dispatcher::{CommandDispatcher, CommandError};
pub use protocol::{RpcRequest, RpcResponse};
pub use server::AutomationServer;
pub use snapshot::{NodeId, SnapshotBuilder, UiElement};
pub use source::{Bounds, Gesture, GlobalAction, NodeAction, UiNode, UiSource, UiSourceHandle};
pub use tools::DeviceTools;
