//! Command handlers.

use super::commands::Commands;
use serde_json::json;
use tollgate::{
    Account, Admission, JsonError, LocalDeployment, Metered, MeteredError, TenantId,
    TollgateResult, UsageReport,
};

/// Dispatch one command against the deployment.
pub async fn handle_command(
    local: &LocalDeployment,
    command: Commands,
    json: bool,
) -> TollgateResult<()> {
    let gateway = local.gateway();
    match command {
        Commands::Status { tenant } => {
            let account = gateway.refresh_account(&TenantId::from(tenant)).await?;
            print_account(&account, json)
        }

        Commands::Trial { tenant } => {
            let account = gateway.start_trial(&TenantId::from(tenant)).await?;
            print_account(&account, json)
        }

        Commands::Subscribe { tenant, tier } => {
            let (account, handle) = gateway.select_tier(&TenantId::from(tenant), tier).await?;
            if json {
                print_json(&json!({ "account": account, "subscription": handle }))
            } else {
                println!("Subscription requested: {}", handle.external_ref);
                if let Some(url) = &handle.confirmation_url {
                    println!("  Confirm at: {}", url);
                }
                print_account(&account, false)
            }
        }

        Commands::Cancel { tenant } => {
            let account = gateway.cancel_subscription(&TenantId::from(tenant)).await?;
            print_account(&account, json)
        }

        Commands::Check { tenant } => {
            let (account, admission) = gateway.check_and_reserve(&TenantId::from(tenant)).await?;
            let denied = match admission {
                Admission::Allow => None,
                Admission::Deny(reason) => Some(reason.to_string()),
            };
            if json {
                print_json(&json!({
                    "allowed": denied.is_none(),
                    "reason": denied,
                    "account": account,
                }))
            } else {
                match &denied {
                    None => println!("Allowed ({} tokens left)", account.remaining_tokens()),
                    Some(reason) => println!("Denied: {}", reason),
                }
                Ok(())
            }
        }

        Commands::Meter {
            tenant,
            tokens,
            fail,
        } => {
            let outcome = gateway
                .meter(&TenantId::from(tenant), || async move {
                    if fail {
                        Err(MeteredError::new("simulated operation failure"))
                    } else {
                        Ok(Metered::new((), UsageReport::total(tokens)))
                    }
                })
                .await?;
            if json {
                print_json(&json!({ "usage": outcome.usage, "account": outcome.account }))
            } else {
                println!("Charged {} tokens", outcome.usage.total_tokens);
                print_account(&outcome.account, false)
            }
        }

        Commands::Activate { tenant, tier } => {
            let account = local.activate(&TenantId::from(tenant), tier).await?;
            print_account(&account, json)
        }

        Commands::Deactivate { tenant } => {
            let account = local.deactivate(&TenantId::from(tenant)).await?;
            print_account(&account, json)
        }

        Commands::Journal { tenant } => {
            let tenant = tenant.map(TenantId::from);
            let records: Vec<_> = local
                .journal()
                .records()
                .await?
                .into_iter()
                .filter(|r| tenant.as_ref().is_none_or(|t| r.tenant_id() == t))
                .collect();
            if json {
                return print_json(&records);
            }
            for record in &records {
                let detail = match (record.usage(), record.error()) {
                    (Some(usage), _) => format!("{} tokens", usage.total_tokens),
                    (None, Some(error)) => error.clone(),
                    (None, None) => String::new(),
                };
                println!(
                    "{}  {:<12} {:<9} {}",
                    record.timestamp().format("%Y-%m-%d %H:%M:%S"),
                    record.tenant_id(),
                    record.status(),
                    detail
                );
            }
            println!("Total: {} records", records.len());
            Ok(())
        }
    }
}

fn print_account(account: &Account, json: bool) -> TollgateResult<()> {
    if json {
        return print_json(account);
    }

    println!("Tenant: {}", account.tenant_id);
    println!("{:-<60}", "");
    println!("  Plan:        {}", account.plan);
    println!(
        "  Usage:       {} / {} tokens",
        account.token_usage, account.token_limit
    );
    println!("  Trial days:  {}", account.trial_days_left);
    println!(
        "  Last reset:  {}",
        account.last_reset.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(external_ref) = &account.subscription_ref {
        println!("  Billing ref: {}", external_ref);
    }
    for entry in &account.plan_log {
        println!(
            "  {}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action
        );
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> TollgateResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| JsonError::new(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
