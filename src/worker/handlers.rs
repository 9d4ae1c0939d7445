//! Per-verb command handlers — spec.md §4.3/§4.6/§4.7/§4.8/§6. The
//! control loop (`worker::control`) has already applied the auth gate via
//! `registry::lookup` before any of these run.

use std::time::Duration;

use protocol::{status, Command};

use session::jail::Jail;
use session::TransferMode;

use crate::auth::AuthError;
use crate::worker::data::DataError;
use crate::worker::listing;
use crate::worker::reply;
use crate::worker::state::{Phase, Session};
use crate::worker::transfer::{self, TransferError};

pub async fn dispatch(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    match cmd.verb.as_str() {
        "USER" => user(cmd, session).await,
        "PASS" => pass(cmd, session).await,
        "SYST" => reply::send(session, status::NAME_SYSTEM_TYPE, "UNIX Type: L8").await,
        "AUTH" => auth(cmd, session).await,
        "PBSZ" => reply::send(session, status::COMMAND_OK, "PBSZ=0").await,
        "PROT" => prot(cmd, session).await,
        "NOOP" => reply::send(session, status::COMMAND_OK, "NOOP ok").await,
        "FEAT" => feat(session).await,
        "QUIT" => quit(session).await,
        "TYPE" => type_cmd(cmd, session).await,
        "PASV" => pasv(session).await,
        "EPSV" => epsv(session).await,
        "LIST" => list(cmd, session, true).await,
        "NLST" => list(cmd, session, false).await,
        "SIZE" => size(cmd, session).await,
        "RETR" => retr(cmd, session).await,
        "STOR" => stor(cmd, session).await,
        "MDTM" => mdtm(cmd, session).await,
        "CWD" => cwd(cmd, session).await,
        "PWD" => pwd(session).await,
        "ABOR" => abor(session).await,
        "MKD" => mkd(cmd, session).await,
        "RMD" => rmd(cmd, session).await,
        "DELE" => dele(cmd, session).await,
        _ => {
            reply::send(
                session,
                status::COMMAND_NOT_IMPLEMENTED_PERM,
                "Command not implemented",
            )
            .await
        }
    }
}

async fn user(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    let Some(name) = cmd.args.first() else {
        return reply::send(session, status::SYNTAX_ERROR, "Usage: USER <name>").await;
    };

    if name == "root" || !session.authenticator.user_exists(name) {
        session.phase = Phase::Closing;
        return reply::send(session, status::NOT_LOGGED_IN, "User not found").await;
    }

    session.username = name.clone();
    reply::send(session, status::USER_NAME_OK, "Please specify the password").await
}

async fn pass(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    if session.username.is_empty() {
        session.phase = Phase::Closing;
        return reply::send(session, status::NOT_LOGGED_IN, "Login with USER first").await;
    }

    let password = cmd.args.first().cloned().unwrap_or_default();

    match session.authenticator.verify(&session.username, &password) {
        Ok(user) => {
            session.jail = Some(Jail::new(user.home_dir, user.uid, user.gid));
            session.phase = Phase::Authenticated;
            reply::send(session, status::USER_LOGGED_IN, "Login successful").await
        }
        Err(AuthError::UnknownUser | AuthError::BadPassword) => {
            session.phase = Phase::Closing;
            reply::send(session, status::NOT_LOGGED_IN, "Login incorrect").await
        }
    }
}

async fn auth(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    let Some(mechanism) = cmd.args.first() else {
        return reply::send(session, status::SYNTAX_ERROR, "Usage: AUTH TLS").await;
    };

    if mechanism.to_ascii_uppercase() != "TLS" {
        return reply::send(session, status::COMMAND_NOT_IMPLEMENTED_PERM, "Unsupported AUTH mechanism")
            .await;
    }

    if session.control().is_tls() {
        return reply::send(session, status::COMMAND_NOT_IMPLEMENTED_PERM, "Already using TLS").await;
    }

    reply::send(session, status::AUTH_TLS_OK, "AUTH TLS Success").await?;

    let Some(tcp) = session.take_plain_control() else {
        // Lost a race with a concurrent AUTH TLS; nothing else to do.
        return Ok(());
    };

    match crate::tls::accept(&session.tls_acceptor, tcp).await {
        Ok(channel) => {
            session.set_control(channel);
            session.control_tls = true;
            Ok(())
        }
        Err(e) => {
            log::error!("control TLS handshake failed for {}: {e}", session.peer_ip);
            session.phase = Phase::Closing;
            Err(e)
        }
    }
}

async fn prot(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    match cmd.args.first().map(|s| s.to_ascii_uppercase()) {
        Some(level) if level == "P" => {
            session.data_tls_required = true;
            reply::send(session, status::COMMAND_OK, "PROT now Private").await
        }
        _ => reply::send(session, status::COMMAND_NOT_IMPLEMENTED_PERM, "Unsupported PROT level").await,
    }
}

async fn feat(session: &mut Session) -> std::io::Result<()> {
    reply::send_multiline(
        session,
        211,
        &["EPSV", "PASV", "AUTH", "SIZE", "MDTM", "MLSD"],
        "End",
    )
    .await
}

async fn quit(session: &mut Session) -> std::io::Result<()> {
    reply::send(session, status::SERVICE_CLOSING, "Goodbye").await?;
    session.phase = Phase::Closing;
    Ok(())
}

async fn type_cmd(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    match cmd.args.first().map(|s| s.to_ascii_uppercase()) {
        Some(t) if t == "I" => {
            session.transfer_mode = TransferMode::Image;
            reply::send(session, status::COMMAND_OK, "Switching to Binary mode").await
        }
        Some(t) if t == "A" => {
            session.transfer_mode = TransferMode::Ascii;
            reply::send(session, status::COMMAND_OK, "Switching to ASCII mode").await
        }
        _ => reply::send(session, status::UNSUPPORTED_TYPE, "Unsupported TYPE").await,
    }
}

async fn pasv(session: &mut Session) -> std::io::Result<()> {
    let local_addr = session.control().local_addr()?;
    match session.data.open_passive(local_addr).await {
        Ok((ip, port)) => {
            let octets = ip.octets();
            reply::send(
                session,
                status::ENTERING_PASSIVE_MODE,
                format!(
                    "Entering Passive Mode {},{},{},{},{},{}",
                    octets[0],
                    octets[1],
                    octets[2],
                    octets[3],
                    port >> 8,
                    port & 0xff
                ),
            )
            .await
        }
        Err(e) => {
            log::warn!("PASV failed for {}: {e}", session.peer_ip);
            reply::send(session, status::CANNOT_OPEN_DATA, "Cannot open passive connection").await
        }
    }
}

async fn epsv(session: &mut Session) -> std::io::Result<()> {
    let local_addr = session.control().local_addr()?;
    match session.data.open_passive(local_addr).await {
        Ok((_, port)) => {
            reply::send(
                session,
                status::ENTERING_EPSV_MODE,
                format!("Entering Extended Passive Mode (|||{port}|)"),
            )
            .await
        }
        Err(e) => {
            log::warn!("EPSV failed for {}: {e}", session.peer_ip);
            reply::send(session, status::CANNOT_OPEN_DATA, "Cannot open passive connection").await
        }
    }
}

async fn accept_data(session: &mut Session) -> Result<(), DataError> {
    let timeout = Duration::from_secs(session.config.data_connection_accept_timeout_secs.max(1));
    let tls_required = session.data_tls_required;
    session
        .data
        .accept(&session.peer_ip, tls_required, &session.tls_acceptor, timeout)
        .await
}

async fn list(cmd: Command, session: &mut Session, long_format: bool) -> std::io::Result<()> {
    let (flags, path_arg) = listing::parse_args(&cmd.args);

    if path_arg.contains("..") {
        return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Invalid path").await;
    }

    let Some(dir) = session.resolve_path(&path_arg) else {
        return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to list directory").await;
    };

    reply::send(session, status::FILE_STATUS_OKAY, "Here comes the directory listing").await?;

    if let Err(e) = accept_data(session).await {
        log::warn!("data accept failed for LIST: {e}");
        session.data.close();
        return reply::send(session, status::CONNECTION_CLOSED, "Connection closed; transfer aborted").await;
    }

    let supervisor = session.supervisor.clone();
    let result = {
        let Some(stream) = session.data.stream_mut() else {
            return reply::send(session, status::CONNECTION_CLOSED, "Connection closed; transfer aborted").await;
        };
        listing::emit(&dir, flags, long_format, &supervisor, stream).await
    };

    session.data.close();

    match result {
        Ok(()) => reply::send(session, status::DATA_CONNECTION_CLOSING, "Directory send OK").await,
        Err(e) => {
            log::warn!("listing failed: {e:?}");
            reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to list directory").await
        }
    }
}

async fn size(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    let Some(arg) = cmd.args.first() else {
        return reply::send(session, status::SYNTAX_ERROR, "Usage: SIZE <path>").await;
    };

    let Some(path) = session.resolve_path(arg) else {
        return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "File not found").await;
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) => reply::send(session, status::FILE_STATUS, meta.len().to_string()).await,
        Err(_) => reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "File not found").await,
    }
}

async fn mdtm(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    use std::os::unix::fs::MetadataExt;

    let Some(arg) = cmd.args.first() else {
        return reply::send(session, status::SYNTAX_ERROR, "Usage: MDTM <path>").await;
    };

    let Some(path) = session.resolve_path(arg) else {
        return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "File not found").await;
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) => {
            let stamp = format_utc_compact(meta.mtime());
            reply::send(session, status::FILE_STATUS, stamp).await
        }
        Err(_) => reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "File not found").await,
    }
}

fn format_utc_compact(epoch_secs: i64) -> String {
    let time = epoch_secs as libc::time_t;
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    unsafe {
        libc::gmtime_r(&time, &mut tm);
    }

    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        tm.tm_year + 1900,
        tm.tm_mon + 1,
        tm.tm_mday,
        tm.tm_hour,
        tm.tm_min,
        tm.tm_sec,
    )
}

async fn cwd(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    let Some(arg) = cmd.args.first() else {
        return reply::send(session, status::SYNTAX_ERROR, "Usage: CWD <path>").await;
    };

    let Some(resolved) = session.resolve_path(arg) else {
        return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to change directory").await;
    };

    match tokio::fs::metadata(&resolved).await {
        Ok(meta) if meta.is_dir() => {
            session.cwd = session.logical_join(arg);
            reply::send(session, status::FILE_ACTION_OK, "Directory successfully changed").await
        }
        _ => reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to change directory").await,
    }
}

async fn pwd(session: &mut Session) -> std::io::Result<()> {
    let cwd = session.cwd.clone();
    reply::send(session, status::PATHNAME_CREATED, format!("\"{cwd}\" is current directory")).await
}

async fn abor(session: &mut Session) -> std::io::Result<()> {
    if session.data.active {
        session.data.close();
        reply::send(session, status::CONNECTION_CLOSED, "Connection closed; transfer aborted").await
    } else {
        reply::send(session, status::DATA_CONNECTION_CLOSING, "No transfer in progress").await
    }
}

async fn mkd(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    let Some(arg) = cmd.args.first() else {
        return reply::send(session, status::SYNTAX_ERROR, "Usage: MKD <path>").await;
    };

    let Some(path) = session.resolve_path(arg) else {
        return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to create directory").await;
    };

    match tokio::fs::create_dir(&path).await {
        Ok(()) => reply::send(session, status::PATHNAME_CREATED, format!("\"{arg}\" created")).await,
        Err(_) => reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to create directory").await,
    }
}

async fn rmd(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    let Some(arg) = cmd.args.first() else {
        return reply::send(session, status::SYNTAX_ERROR, "Usage: RMD <path>").await;
    };

    let Some(path) = session.resolve_path(arg) else {
        return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to remove directory").await;
    };

    match tokio::fs::remove_dir(&path).await {
        Ok(()) => reply::send(session, status::FILE_ACTION_OK, "Directory removed").await,
        Err(_) => reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to remove directory").await,
    }
}

async fn dele(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    let force = cmd.args.iter().any(|a| a == "-f");
    let recursive = cmd.args.iter().any(|a| a == "-r");
    let Some(arg) = cmd.args.iter().find(|a| !a.starts_with('-')) else {
        return reply::send(session, status::SYNTAX_ERROR, "Usage: DELE <path>").await;
    };

    let Some(path) = session.resolve_path(arg) else {
        if force {
            return reply::send(session, status::FILE_ACTION_OK, "Force delete").await;
        }
        return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to delete file").await;
    };

    let is_dir = tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false);
    let result = if recursive && is_dir {
        tokio::fs::remove_dir_all(&path).await
    } else {
        tokio::fs::remove_file(&path).await
    };

    match result {
        Ok(()) => reply::send(session, status::FILE_ACTION_OK, "File deleted").await,
        Err(_) if force => reply::send(session, status::FILE_ACTION_OK, "Force delete").await,
        Err(_) => reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to delete file").await,
    }
}

async fn retr(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    let Some(arg) = cmd.args.first() else {
        return reply::send(session, status::SYNTAX_ERROR, "Usage: RETR <path>").await;
    };

    let Some(path) = session.resolve_path(arg) else {
        return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "File not found").await;
    };

    let (file, size) = match transfer::open_retr(&path).await {
        Ok(pair) => pair,
        Err(_) => {
            return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to open file").await
        }
    };

    // Ordering guarantee (spec.md §5.2): the 150 is flushed before any
    // byte reaches the data channel.
    reply::send(session, status::FILE_STATUS_OKAY, format!("Opening BINARY mode data connection for {arg} ({size} bytes)")).await?;

    if let Err(e) = accept_data(session).await {
        log::warn!("data accept failed for RETR: {e}");
        session.data.close();
        return reply::send(session, status::CONNECTION_CLOSED, "Connection closed; transfer aborted").await;
    }

    let result = {
        let Some(stream) = session.data.stream_mut() else {
            return reply::send(session, status::CONNECTION_CLOSED, "Connection closed; transfer aborted").await;
        };
        transfer::pump_retr(file, size, stream).await
    };

    session.data.close();

    match result {
        Ok(sent) if sent == size => {
            reply::send(session, status::DATA_CONNECTION_CLOSING, "Transfer complete").await
        }
        Ok(_) => reply::send(session, status::CONNECTION_CLOSED, "Connection closed; transfer aborted").await,
        Err(TransferError::OutOfSpace) => {
            reply::send(session, status::INSUFFICIENT_STORAGE, "Insufficient storage space").await
        }
        Err(e) => {
            log::warn!("RETR failed: {e}");
            reply::send(session, status::CONNECTION_CLOSED, "Connection closed; transfer aborted").await
        }
    }
}

async fn stor(cmd: Command, session: &mut Session) -> std::io::Result<()> {
    let Some(arg) = cmd.args.first() else {
        return reply::send(session, status::SYNTAX_ERROR, "Usage: STOR <path>").await;
    };

    let Some(path) = session.resolve_path(arg) else {
        return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to open file").await;
    };

    let mut file = match transfer::open_stor(&path).await {
        Ok(file) => file,
        Err(_) => {
            return reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to open file").await
        }
    };

    reply::send(session, status::FILE_STATUS_OKAY, format!("Ok to send data for {arg}")).await?;

    if let Err(e) = accept_data(session).await {
        log::warn!("data accept failed for STOR: {e}");
        session.data.close();
        return reply::send(session, status::CONNECTION_CLOSED, "Connection closed; transfer aborted").await;
    }

    let result = {
        let Some(stream) = session.data.stream_mut() else {
            return reply::send(session, status::CONNECTION_CLOSED, "Connection closed; transfer aborted").await;
        };
        transfer::pump_stor(&mut file, stream).await
    };

    session.data.close();

    match result {
        Ok(_) => reply::send(session, status::DATA_CONNECTION_CLOSING, "Transfer complete").await,
        Err(TransferError::OutOfSpace) => {
            reply::send(session, status::INSUFFICIENT_STORAGE, "Insufficient storage space").await
        }
        Err(e) => {
            log::warn!("STOR failed: {e}");
            reply::send(session, status::FILE_ACTION_NOT_TAKEN_PERM, "Failed to store file").await
        }
    }
}
