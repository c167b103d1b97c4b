/// Router Module Index
///
/// Routes are split by who may call them. Access control is attached per
/// module in `create_router`, so a handler's access level follows from the
/// file it is registered in.

/// Anonymous access: health, login/registration and the read-only catalog.
pub mod public;

/// Mounted under `/api` behind the authentication gate.
pub mod authenticated;

/// Mounted under `/api/admin` behind the authentication gate and the
/// Administrator role gate.
pub mod admin;
