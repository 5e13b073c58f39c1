//! WebSocket close status codes (RFC 6455 section 7.4 and the IANA registry)

pub const NORMAL: u16 = 1000;
pub const GOING_AWAY: u16 = 1001;
pub const PROTOCOL_ERROR: u16 = 1002;
pub const UNSUPPORTED: u16 = 1003;
/// Never sent on the wire; the close frame had no status.
pub const NO_STATUS: u16 = 1005;
/// Never sent on the wire; the connection dropped without a close frame.
pub const ABNORMAL: u16 = 1006;
pub const UNSUPPORTED_PAYLOAD: u16 = 1007;
pub const POLICY_VIOLATION: u16 = 1008;
pub const TOO_LARGE: u16 = 1009;
pub const MANDATORY_EXTENSION: u16 = 1010;
pub const SERVER_ERROR: u16 = 1011;
pub const SERVICE_RESTART: u16 = 1012;
pub const TRY_AGAIN_LATER: u16 = 1013;
pub const BAD_GATEWAY: u16 = 1014;
pub const TLS_HANDSHAKE_FAIL: u16 = 1015;

pub fn describe(code: u16) -> &'static str {
    match code {
        NORMAL => "normal closure",
        GOING_AWAY => "going away",
        PROTOCOL_ERROR => "protocol error",
        UNSUPPORTED => "unsupported data",
        NO_STATUS => "no status received",
        ABNORMAL => "abnormal closure",
        UNSUPPORTED_PAYLOAD => "invalid frame payload data",
        POLICY_VIOLATION => "policy violation",
        TOO_LARGE => "message too big",
        MANDATORY_EXTENSION => "mandatory extension",
        SERVER_ERROR => "internal server error",
        SERVICE_RESTART => "service restart",
        TRY_AGAIN_LATER => "try again later",
        BAD_GATEWAY => "bad gateway",
        TLS_HANDSHAKE_FAIL => "TLS handshake failure",
        3000..=3999 => "registered",
        4000..=4999 => "private use",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_ranged_codes() {
        assert_eq!(describe(1000), "normal closure");
        assert_eq!(describe(ABNORMAL), "abnormal closure");
        assert_eq!(describe(4321), "private use");
        assert_eq!(describe(1004), "unknown");
    }
}
