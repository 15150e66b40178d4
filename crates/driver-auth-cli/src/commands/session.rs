//! Session inspection commands.

use super::CommandContext;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde_json::json;

/// Show the stored session.
pub async fn status(ctx: &CommandContext, format: &OutputFormat) -> Result<()> {
    let manager = ctx.session_manager()?;
    let state = manager.state();
    let identity = manager.identity();
    let expires_at = manager
        .credential()
        .and_then(|credential| credential.expires_at_utc())
        .map(|at| at.to_rfc3339());

    let value = json!({
        "state": state,
        "authenticated": manager.is_authenticated(),
        "identity": identity,
        "expires_at": expires_at,
    });

    output::print_value(&value, format, || {
        output::print_heading("Session");
        output::print_row("State", &format!("{:?}", state));
        match &identity {
            Some(identity) => {
                output::print_row("Session", &identity.session_id);
                output::print_row("Driver", &identity.driver_id.to_string());
                output::print_row("Partner", &identity.partner_id.to_string());
                output::print_row("Company", &identity.company_id.to_string());
                output::print_row("City", &identity.company_city_id.to_string());
                if identity.degraded {
                    output::print_row("Note", "placeholder identity");
                }
            }
            None => output::print_row("Driver", "not signed in"),
        }
        if let Some(expires_at) = &expires_at {
            output::print_row("Expires", expires_at);
        }
    });
    Ok(())
}

/// Print a valid access token, refreshing it if needed.
pub async fn token(ctx: &CommandContext, format: &OutputFormat) -> Result<()> {
    let manager = ctx.session_manager()?;
    let token = manager.get_valid_access_token().await?;

    output::print_value(&json!({ "access_token": token }), format, || {
        println!("{}", token)
    });
    Ok(())
}

/// Check the stored session against the backend.
pub async fn validate(ctx: &CommandContext, format: &OutputFormat) -> Result<()> {
    let manager = ctx.session_manager()?;

    if manager.validate_existing().await {
        output::print_success("Session is valid", format);
        Ok(())
    } else {
        anyhow::bail!("Session is not valid; sign in again")
    }
}

/// Forget the stored session.
pub async fn logout(ctx: &CommandContext, format: &OutputFormat) -> Result<()> {
    let manager = ctx.session_manager()?;
    manager.logout();
    output::print_success("Logged out", format);
    Ok(())
}
