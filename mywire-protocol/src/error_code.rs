//! Server error number to symbolic name catalog.

/// Name used for server error numbers missing from the catalog.
pub const UNKNOWN_CODE: &str = "UNKNOWN_CODE_PLEASE_REPORT";

pub const ER_CON_COUNT_ERROR: u16 = 1040;
pub const ER_HANDSHAKE_ERROR: u16 = 1043;
pub const ER_DBACCESS_DENIED_ERROR: u16 = 1044;
pub const ER_ACCESS_DENIED_ERROR: u16 = 1045;
pub const ER_NO_DB_ERROR: u16 = 1046;
pub const ER_UNKNOWN_COM_ERROR: u16 = 1047;
pub const ER_BAD_NULL_ERROR: u16 = 1048;
pub const ER_BAD_DB_ERROR: u16 = 1049;
pub const ER_TABLE_EXISTS_ERROR: u16 = 1050;
pub const ER_BAD_TABLE_ERROR: u16 = 1051;
pub const ER_NON_UNIQ_ERROR: u16 = 1052;
pub const ER_SERVER_SHUTDOWN: u16 = 1053;
pub const ER_BAD_FIELD_ERROR: u16 = 1054;
pub const ER_DUP_ENTRY: u16 = 1062;
pub const ER_PARSE_ERROR: u16 = 1064;
pub const ER_EMPTY_QUERY: u16 = 1065;
pub const ER_UNKNOWN_ERROR: u16 = 1105;
pub const ER_HOST_IS_BLOCKED: u16 = 1129;
pub const ER_HOST_NOT_PRIVILEGED: u16 = 1130;
pub const ER_WRONG_VALUE_COUNT_ON_ROW: u16 = 1136;
pub const ER_TABLEACCESS_DENIED_ERROR: u16 = 1142;
pub const ER_NO_SUCH_TABLE: u16 = 1146;
pub const ER_SYNTAX_ERROR: u16 = 1149;
pub const ER_NET_PACKET_TOO_LARGE: u16 = 1153;
pub const ER_NET_READ_ERROR: u16 = 1158;
pub const ER_NET_READ_INTERRUPTED: u16 = 1159;
pub const ER_NET_ERROR_ON_WRITE: u16 = 1160;
pub const ER_NET_WRITE_INTERRUPTED: u16 = 1161;
pub const ER_TOO_MANY_USER_CONNECTIONS: u16 = 1203;
pub const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
pub const ER_LOCK_DEADLOCK: u16 = 1213;
pub const ER_NO_REFERENCED_ROW: u16 = 1216;
pub const ER_ROW_IS_REFERENCED: u16 = 1217;
pub const ER_USER_LIMIT_REACHED: u16 = 1226;
pub const ER_SPECIFIC_ACCESS_DENIED_ERROR: u16 = 1227;
pub const ER_NOT_SUPPORTED_AUTH_MODE: u16 = 1251;
pub const ER_WARN_DATA_OUT_OF_RANGE: u16 = 1264;
pub const ER_TRUNCATED_WRONG_VALUE: u16 = 1292;
pub const ER_QUERY_INTERRUPTED: u16 = 1317;
pub const ER_TRUNCATED_WRONG_VALUE_FOR_FIELD: u16 = 1366;
pub const ER_DATA_TOO_LONG: u16 = 1406;
pub const ER_ROW_IS_REFERENCED_2: u16 = 1451;
pub const ER_NO_REFERENCED_ROW_2: u16 = 1452;

const CATALOG: &[(u16, &str)] = &[
    (ER_CON_COUNT_ERROR, "ER_CON_COUNT_ERROR"),
    (ER_HANDSHAKE_ERROR, "ER_HANDSHAKE_ERROR"),
    (ER_DBACCESS_DENIED_ERROR, "ER_DBACCESS_DENIED_ERROR"),
    (ER_ACCESS_DENIED_ERROR, "ER_ACCESS_DENIED_ERROR"),
    (ER_NO_DB_ERROR, "ER_NO_DB_ERROR"),
    (ER_UNKNOWN_COM_ERROR, "ER_UNKNOWN_COM_ERROR"),
    (ER_BAD_NULL_ERROR, "ER_BAD_NULL_ERROR"),
    (ER_BAD_DB_ERROR, "ER_BAD_DB_ERROR"),
    (ER_TABLE_EXISTS_ERROR, "ER_TABLE_EXISTS_ERROR"),
    (ER_BAD_TABLE_ERROR, "ER_BAD_TABLE_ERROR"),
    (ER_NON_UNIQ_ERROR, "ER_NON_UNIQ_ERROR"),
    (ER_SERVER_SHUTDOWN, "ER_SERVER_SHUTDOWN"),
    (ER_BAD_FIELD_ERROR, "ER_BAD_FIELD_ERROR"),
    (ER_DUP_ENTRY, "ER_DUP_ENTRY"),
    (ER_PARSE_ERROR, "ER_PARSE_ERROR"),
    (ER_EMPTY_QUERY, "ER_EMPTY_QUERY"),
    (ER_UNKNOWN_ERROR, "ER_UNKNOWN_ERROR"),
    (ER_HOST_IS_BLOCKED, "ER_HOST_IS_BLOCKED"),
    (ER_HOST_NOT_PRIVILEGED, "ER_HOST_NOT_PRIVILEGED"),
    (ER_WRONG_VALUE_COUNT_ON_ROW, "ER_WRONG_VALUE_COUNT_ON_ROW"),
    (ER_TABLEACCESS_DENIED_ERROR, "ER_TABLEACCESS_DENIED_ERROR"),
    (ER_NO_SUCH_TABLE, "ER_NO_SUCH_TABLE"),
    (ER_SYNTAX_ERROR, "ER_SYNTAX_ERROR"),
    (ER_NET_PACKET_TOO_LARGE, "ER_NET_PACKET_TOO_LARGE"),
    (ER_NET_READ_ERROR, "ER_NET_READ_ERROR"),
    (ER_NET_READ_INTERRUPTED, "ER_NET_READ_INTERRUPTED"),
    (ER_NET_ERROR_ON_WRITE, "ER_NET_ERROR_ON_WRITE"),
    (ER_NET_WRITE_INTERRUPTED, "ER_NET_WRITE_INTERRUPTED"),
    (ER_TOO_MANY_USER_CONNECTIONS, "ER_TOO_MANY_USER_CONNECTIONS"),
    (ER_LOCK_WAIT_TIMEOUT, "ER_LOCK_WAIT_TIMEOUT"),
    (ER_LOCK_DEADLOCK, "ER_LOCK_DEADLOCK"),
    (ER_NO_REFERENCED_ROW, "ER_NO_REFERENCED_ROW"),
    (ER_ROW_IS_REFERENCED, "ER_ROW_IS_REFERENCED"),
    (ER_USER_LIMIT_REACHED, "ER_USER_LIMIT_REACHED"),
    (ER_SPECIFIC_ACCESS_DENIED_ERROR, "ER_SPECIFIC_ACCESS_DENIED_ERROR"),
    (ER_NOT_SUPPORTED_AUTH_MODE, "ER_NOT_SUPPORTED_AUTH_MODE"),
    (ER_WARN_DATA_OUT_OF_RANGE, "ER_WARN_DATA_OUT_OF_RANGE"),
    (ER_TRUNCATED_WRONG_VALUE, "ER_TRUNCATED_WRONG_VALUE"),
    (ER_QUERY_INTERRUPTED, "ER_QUERY_INTERRUPTED"),
    (
        ER_TRUNCATED_WRONG_VALUE_FOR_FIELD,
        "ER_TRUNCATED_WRONG_VALUE_FOR_FIELD",
    ),
    (ER_DATA_TOO_LONG, "ER_DATA_TOO_LONG"),
    (ER_ROW_IS_REFERENCED_2, "ER_ROW_IS_REFERENCED_2"),
    (ER_NO_REFERENCED_ROW_2, "ER_NO_REFERENCED_ROW_2"),
];

/// Returns the symbolic name for a server error number.
pub fn name_of(errno: u16) -> Option<&'static str> {
    CATALOG
        .iter()
        .find(|(code, _)| *code == errno)
        .map(|(_, name)| *name)
}

/// Returns the error number for a symbolic name.
pub fn errno_of(name: &str) -> Option<u16> {
    CATALOG
        .iter()
        .find(|(_, candidate)| *candidate == name)
        .map(|(code, _)| *code)
}
