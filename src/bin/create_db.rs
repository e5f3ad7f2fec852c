use std::str::FromStr;

use tokio_postgres::{Config, NoTls};

const DEFAULT_DB_NAME: &str = "google_review_connector";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // DATABASE_URL names the target database; the admin connection goes to `postgres`.
    let target = match std::env::var("DATABASE_URL") {
        Ok(url) => Config::from_str(&url)?,
        Err(_) => Config::from_str("host=127.0.0.1 user=postgres")?,
    };
    let db_name = std::env::var("DB_NAME")
        .ok()
        .or_else(|| target.get_dbname().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DB_NAME.to_string());

    if !is_valid_db_name(&db_name) {
        return Err(format!("Refusing to create database: invalid database name '{}'", db_name).into());
    }

    let mut admin = target.clone();
    admin.dbname("postgres");

    println!("Connecting to Postgres to provision '{}'...", db_name);
    let (client, connection) = admin.connect(NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {}", e);
        }
    });


    let exists = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&db_name])
        .await?
        .is_some();
    if exists {
        println!("Database '{}' already exists; migrations run when the service starts.", db_name);
        return Ok(());
    }

    client
        .execute(format!("CREATE DATABASE \"{}\"", db_name).as_str(), &[])
        .await?;
    println!("Database '{}' created. Start the service to apply migrations.", db_name);

    Ok(())
}

fn is_valid_db_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
