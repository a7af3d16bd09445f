//! Plan and profile commands.

use anyhow::{Context, Result, bail};
use photoprep_core::config::Config;
use photoprep_core::remote::PlanChange;
use photoprep_core::session::{PlanId, Session};
use serde_json::json;

use crate::cli::client::{Client, client_error};

/// Human-readable credit balance for the session's plan.
pub fn credits_label(config: &Config, session: &Session) -> String {
    if config.plan_catalog().is_metered(&session.plan) {
        format!("{} credits remaining", session.credits_remaining)
    } else {
        "unlimited".to_string()
    }
}

pub fn plans(config: &Config) {
    let catalog = config.plan_catalog();
    for (id, policy) in catalog.iter() {
        let allowance = match policy.monthly_credits {
            Some(credits) => format!("{credits} credits/month"),
            None if policy.metered => "no monthly allowance".to_string(),
            None => "unlimited".to_string(),
        };
        println!(
            "{:<10} {:<12} {allowance}",
            id.as_str(),
            catalog.display_name(id)
        );
    }
}

pub async fn upgrade(config: &Config, plan: &str) -> Result<()> {
    change(config, PlanChange::Upgrade(PlanId::new(plan))).await
}

pub async fn downgrade(config: &Config) -> Result<()> {
    change(config, PlanChange::Downgrade).await
}

async fn change(config: &Config, change: PlanChange) -> Result<()> {
    let mut client = Client::connect(config)?;
    client.require_session().await?;

    let result = client.account().change_plan(change).await;
    client.drain_events();
    let session = result.map_err(|e| client_error(&e))?;

    println!(
        "Plan changed to {} ({})",
        config.plan_catalog().display_name(&session.plan),
        credits_label(config, &session)
    );
    Ok(())
}

pub async fn profile(config: &Config, json: bool) -> Result<()> {
    let mut client = Client::connect(config)?;
    client.require_session().await?;

    let result = client.account().profile().await;
    client.drain_events();
    let profile = result.map_err(|e| client_error(&e))?;
    let Some(session) = client.session().get() else {
        bail!("Session ended while loading the profile");
    };

    if json {
        let value = json!({
            "session": session,
            "total_images": profile.total_images,
            "images_this_month": profile.images_this_month,
        });
        let out = serde_json::to_string_pretty(&value).context("serialize profile")?;
        println!("{out}");
        return Ok(());
    }

    println!("{} <{}>", session.identity.name, session.identity.email);
    println!("Plan:              {}", config.plan_catalog().display_name(&session.plan));
    println!("Credits:           {}", credits_label(config, &session));
    println!("Images this month: {}", profile.images_this_month);
    println!("Total images:      {}", profile.total_images);
    Ok(())
}
