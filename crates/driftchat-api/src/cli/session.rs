//! Session listing CLI command.

use crate::state::AppState;

/// `driftchat sessions` - list stored sessions, most recent first.
pub async fn list_sessions(state: &AppState, json: bool) -> anyhow::Result<()> {
    let sessions = state.chat_service.sessions().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!("  {}", console::style("No sessions yet.").dim());
        println!();
        return Ok(());
    }

    println!();
    for session in &sessions {
        let owner = session
            .user_id
            .map(|u| u.to_string())
            .unwrap_or_else(|| "anonymous".to_string());
        let title = session.title.as_deref().unwrap_or("(untitled)");
        println!(
            "  {}  {}  {}  {}",
            console::style(session.id).cyan(),
            session.updated_at.format("%Y-%m-%d %H:%M:%S"),
            title,
            console::style(owner).dim(),
        );
    }
    println!();
    println!("  {} session(s)", sessions.len());
    println!();

    Ok(())
}
