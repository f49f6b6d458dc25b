use crate::{services::auth, Config, Database};
use anyhow::Result;
use std::path::Path;

use super::UserCommand;

pub fn run(config_path: &Path, command: UserCommand) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database.path)?;

    match command {
        UserCommand::Add {
            name,
            email,
            admin,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => {
                    let p = rpassword::prompt_password("Password: ")?;
                    let p_confirm = rpassword::prompt_password("Confirm password: ")?;
                    if p != p_confirm {
                        anyhow::bail!("Passwords do not match");
                    }
                    p
                }
            };

            let id = auth::create_user(&db, &name, &email, &password, admin)?;
            tracing::info!("User '{}' created with id {}", name, id);
        }
        UserCommand::List => {
            let conn = db.get()?;
            let mut stmt = conn.prepare("SELECT name, email, is_admin FROM users")?;
            let users = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                ))
            })?;

            println!("{:<20} {:<30} {:<10}", "NAME", "EMAIL", "ADMIN");
            println!("{}", "-".repeat(60));
            for user in users {
                let (name, email, is_admin) = user?;
                println!(
                    "{:<20} {:<30} {:<10}",
                    name,
                    email,
                    if is_admin { "yes" } else { "no" }
                );
            }
        }
        UserCommand::Remove { name } => {
            let conn = db.get()?;
            let affected = conn.execute("DELETE FROM users WHERE name = ?", [&name])?;
            if affected > 0 {
                tracing::info!("User '{}' removed", name);
            } else {
                tracing::warn!("User '{}' not found", name);
            }
        }
        UserCommand::Passwd { name } => {
            let password = rpassword::prompt_password("New password: ")?;
            let password_confirm = rpassword::prompt_password("Confirm password: ")?;

            if password != password_confirm {
                anyhow::bail!("Passwords do not match");
            }

            let conn = db.get()?;
            let id: i64 = conn.query_row("SELECT id FROM users WHERE name = ?", [&name], |row| {
                row.get(0)
            })?;
            drop(conn);

            auth::update_password(&db, id, &password)?;
            tracing::info!("Password updated for '{}'", name);
        }
    }

    Ok(())
}
