//! Var-int and push-data encoding

use super::{ScriptError, ScriptResult};

pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;

/// Number of bytes `encode_var_int(n)` produces
pub fn var_int_size(n: u64) -> usize {
    if n <= 0xfc {
        1
    } else if n <= 0xffff {
        3
    } else if n <= 0xffff_ffff {
        5
    } else {
        9
    }
}

/// Append the var-int encoding of `n`
pub fn write_var_int(n: u64, out: &mut Vec<u8>) {
    if n <= 0xfc {
        out.push(n as u8);
    } else if n <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&n.to_le_bytes());
    }
}

pub fn encode_var_int(n: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(var_int_size(n));
    write_var_int(n, &mut out);
    out
}

/// Read a var-int from the front of `bytes`; returns the value and bytes consumed
pub fn decode_var_int(bytes: &[u8]) -> ScriptResult<(u64, usize)> {
    let first = *bytes.first().ok_or(ScriptError::TruncatedVarInt)?;
    let width = match first {
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
        n => return Ok((n as u64, 1)),
    };

    let body = bytes.get(1..1 + width).ok_or(ScriptError::TruncatedVarInt)?;
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(body);
    Ok((u64::from_le_bytes(buf), 1 + width))
}

/// Smallest push encoding for `data`
pub fn push_data(data: &[u8]) -> ScriptResult<Vec<u8>> {
    let len = data.len();
    let mut out = Vec::with_capacity(len + 5);

    if len < OP_PUSHDATA1 as usize {
        out.push(len as u8);
    } else if len <= 0xff {
        out.push(OP_PUSHDATA1);
        out.push(len as u8);
    } else if len <= 0xffff {
        out.push(OP_PUSHDATA2);
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else if len as u64 <= 0xffff_ffff {
        out.push(OP_PUSHDATA4);
        out.extend_from_slice(&(len as u32).to_le_bytes());
    } else {
        return Err(ScriptError::PushTooLarge(len));
    }

    out.extend_from_slice(data);
    Ok(out)
}
