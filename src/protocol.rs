//! Native messaging framing and message shapes.
//!
//! Every frame is a native-endian `u32` length followed by that many bytes of
//! UTF-8 JSON. A body that is not a known message fails with `InvalidData`
//! and leaves the stream on a frame boundary; an oversized length fails with
//! `InvalidInput` and does not.

use std::io::{self, Read, Write};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::host::{ScriptDetails, StylesheetDetails};
use crate::tab::{ChangeInfo, Tab, TabId};

pub const MAX_MESSAGE_LEN: u32 = 64 * 1024 * 1024;

pub type RequestId = u64;

/// Messages sent by the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Incoming {
    TabUpdated {
        tab_id: TabId,
        #[serde(default)]
        change_info: ChangeInfo,
        tab: Tab,
    },
    TabRemoved {
        tab_id: TabId,
    },
    Response {
        request_id: RequestId,
        #[serde(default)]
        result: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Messages sent to the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Outgoing {
    ExecuteScript {
        request_id: RequestId,
        tab_id: TabId,
        #[serde(flatten)]
        details: ScriptDetails,
    },
    InsertCss {
        tab_id: TabId,
        #[serde(flatten)]
        details: StylesheetDetails,
    },
    QueryTabs {
        request_id: RequestId,
    },
    GetTab {
        request_id: RequestId,
        tab_id: TabId,
    },
    ResourcesLoaded {
        tab_id: TabId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
    },
}

pub fn read_message<R: Read, T: DeserializeOwned>(mut reader: R) -> io::Result<T> {
    let len = reader.read_u32::<NativeEndian>()?;
    if len > MAX_MESSAGE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message of {len} bytes exceeds limit"),
        ));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;

    serde_json::from_slice(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn write_message<W: Write, T: Serialize>(mut writer: W, msg: &T) -> io::Result<()> {
    let body = serde_json::to_vec(msg)?;
    let len = u32::try_from(body.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "message too large"))?;

    writer.write_u32::<NativeEndian>(len)?;
    writer.write_all(&body)?;
    writer.flush()
}
