//! CLI session command handlers for login, status, logout, and whoami.

use std::io::{self, BufRead, Write};

use chrono::{DateTime, Utc};

use super::{GlobalArgs, LoginArgs, WhoamiArgs};
use crate::auth::{LoginRequest, UserInfo};
use crate::error::{Result, SdkError};

/// Handle `baas login`.
pub async fn handle_login(global: &GlobalArgs, args: LoginArgs) -> Result<()> {
    let app = global.application()?;
    let password = match args.password {
        Some(password) => password,
        None => prompt_password()?,
    };
    let request = LoginRequest::builder()
        .username(args.username)
        .password(password)
        .maybe_options(args.sliding.then_some("sliding"))
        .build();

    let token = app.login().login(request).await?;
    println!("✅ Logged in to {}", app.base_url());
    if let Some(expires) = token.expire_time.and_then(DateTime::<Utc>::from_timestamp_millis) {
        println!("   Token expires at {}", expires.to_rfc3339());
    }
    if let Err(err) = app.login().load_user(None).await {
        tracing::debug!(error = %err, "Could not load user info after login");
    }
    Ok(())
}

/// Handle `baas status`.
pub async fn handle_status(global: &GlobalArgs) -> Result<()> {
    let app = global.application()?;
    println!("Application: {}", app.base_url());
    match app.tokens().get() {
        Some(token) => {
            let expiry = token
                .expire_time
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "no expiry".to_string());
            println!("✅ Authenticated ({} token, {expiry})", token.token_type);
            if let Some(user) = app.users().get() {
                println!("   User: {}", describe(&user));
            }
        }
        None => println!("❌ Not logged in"),
    }
    Ok(())
}

/// Handle `baas logout`.
pub async fn handle_logout(global: &GlobalArgs) -> Result<()> {
    let app = global.application()?;
    if !app.tokens().is_authenticated() {
        println!("Not logged in");
        return Ok(());
    }
    match app.login().logout().await {
        Ok(()) => println!("✅ Logged out"),
        Err(err) => println!("⚠️  Session cleared locally; revoking the token failed: {err}"),
    }
    Ok(())
}

/// Handle `baas whoami`.
pub async fn handle_whoami(global: &GlobalArgs, args: WhoamiArgs) -> Result<()> {
    let app = global.application()?;
    let login = app.login();
    let user = match login.user() {
        Some(user) if !args.refresh => user,
        _ => login.load_user(args.embed.as_deref()).await?,
    };
    println!("{}", describe(&user));
    if !user.roles.is_empty() {
        println!("   Roles: {}", user.roles.join(", "));
    }
    Ok(())
}

fn describe(user: &UserInfo) -> String {
    match (&user.display_name, &user.email) {
        (Some(name), Some(email)) => format!("{} ({name}, {email})", user.user_name),
        (Some(name), None) => format!("{} ({name})", user.user_name),
        (None, Some(email)) => format!("{} ({email})", user.user_name),
        (None, None) => user.user_name.clone(),
    }
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(SdkError::InvalidArgument("password is required".to_string()));
    }
    Ok(password)
}
