//! Numeric reply codes, named after their RFC 959 / RFC 4217 meaning.

/// File status okay; about to open data connection.
pub const FILE_STATUS_OKAY: u16 = 150;

/// Command okay.
pub const COMMAND_OK: u16 = 200;
/// Command not implemented, superfluous.
pub const COMMAND_NOT_IMPLEMENTED: u16 = 202;
/// NAME system type.
pub const NAME_SYSTEM_TYPE: u16 = 215;
/// System status, or system help reply (used for the multi-line `FEAT` body).
pub const EXTENDED_FEATURES: u16 = 211;
/// Service ready for new user.
pub const SERVICE_READY: u16 = 220;
/// Service closing control connection.
pub const SERVICE_CLOSING: u16 = 221;
/// Closing data connection. Requested file action successful.
pub const DATA_CONNECTION_CLOSING: u16 = 226;
/// Entering Passive Mode (h1,h2,h3,h4,p1,p2).
pub const ENTERING_PASSIVE_MODE: u16 = 227;
/// Entering Extended Passive Mode (|||port|).
pub const ENTERING_EPSV_MODE: u16 = 229;
/// User logged in, proceed.
pub const USER_LOGGED_IN: u16 = 230;
/// AUTH command OK; expecting TLS negotiation.
pub const AUTH_TLS_OK: u16 = 234;
/// Requested file action okay, completed.
pub const FILE_ACTION_OK: u16 = 250;
/// "PATHNAME" created.
pub const PATHNAME_CREATED: u16 = 257;
/// File status.
pub const FILE_STATUS: u16 = 213;

/// User name okay, need password.
pub const USER_NAME_OK: u16 = 331;

/// Can't open data connection.
pub const CANNOT_OPEN_DATA: u16 = 425;
/// Connection closed; transfer aborted.
pub const CONNECTION_CLOSED: u16 = 426;
/// Requested action not taken (out of storage space).
pub const INSUFFICIENT_STORAGE: u16 = 452;

/// Syntax error, command unrecognized.
pub const SYNTAX_ERROR: u16 = 500;
/// Command not implemented.
pub const COMMAND_NOT_IMPLEMENTED_PERM: u16 = 502;
/// Unsupported supplied parameter.
pub const UNSUPPORTED_TYPE: u16 = 504;
/// Not logged in.
pub const NOT_LOGGED_IN: u16 = 530;
/// Requested action not taken (e.g. file not found, permission denied).
pub const FILE_ACTION_NOT_TAKEN_PERM: u16 = 550;
