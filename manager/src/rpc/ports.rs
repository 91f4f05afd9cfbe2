//! Device-native port identifiers.
//!
//! Ports travel over RPC as strings (`"G.hn 1/4"`, `"10G 1/2"`, `"Gi 1/1"`,
//! `"NONE"`). Only the signal diagnostics call takes the numeric index, so
//! this mapping is used for that call and nothing else.

use crate::errors::PortError;

/// Number of G.hn access ports on a device
pub const GHN_PORT_COUNT: u32 = 24;
/// Number of 10G uplinks
pub const UPLINK_PORT_COUNT: u32 = 2;
/// Index of the single copper management port `Gi 1/1`
pub const GI_PORT_INDEX: u32 = 27;
pub const NONE_PORT: &str = "NONE";

/// Numeric index for a device-native port string.
pub fn port_index(name: &str) -> Result<u32, PortError> {
    let trimmed = name.trim();
    if trimmed.eq_ignore_ascii_case(NONE_PORT) {
        return Ok(0);
    }

    let unknown = || PortError::UnknownName(name.to_string());
    let (prefix, slot) = trimmed.split_once(' ').ok_or_else(unknown)?;
    let (unit, number) = slot.trim().split_once('/').ok_or_else(unknown)?;
    if unit != "1" {
        return Err(unknown());
    }
    let number: u32 = number.parse().map_err(|_| unknown())?;

    match prefix.to_ascii_lowercase().as_str() {
        "g.hn" if (1..=GHN_PORT_COUNT).contains(&number) => Ok(number),
        "10g" if (1..=UPLINK_PORT_COUNT).contains(&number) => Ok(GHN_PORT_COUNT + number),
        "gi" if number == 1 => Ok(GI_PORT_INDEX),
        _ => Err(unknown()),
    }
}

/// Inverse of [`port_index`].
pub fn port_name(index: u32) -> Result<String, PortError> {
    match index {
        0 => Ok(NONE_PORT.to_string()),
        n if n <= GHN_PORT_COUNT => Ok(format!("G.hn 1/{}", n)),
        n if n <= GHN_PORT_COUNT + UPLINK_PORT_COUNT => Ok(format!("10G 1/{}", n - GHN_PORT_COUNT)),
        GI_PORT_INDEX => Ok("Gi 1/1".to_string()),
        other => Err(PortError::UnknownIndex(other)),
    }
}
