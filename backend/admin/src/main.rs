//! Operator tasks run straight against Redis.
use anyhow::{Context, anyhow, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use lupad_types::{AuthMethod, UserType};
use server::{
    auth::password::hash_password,
    cache::{Cache, RedisCache},
    database::{init_redis, keys},
    models::{Driver, User, UserProfile, Vehicle},
    store::{RedisRepository, Repository, StoreError},
    utils::normalize_phone,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, env = "REDIS_URL", default_value = "redis://localhost:6379")]
    redis_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lets a driver go online.
    VerifyDriver {
        phone: String,

        /// Revoke verification instead.
        #[arg(long)]
        revoke: bool,
    },

    /// Prints an account with its driver profile.
    Show { phone: String },

    /// Fills the store with test accounts. Phones already taken are skipped.
    Seed {
        #[arg(long, default_value_t = 10)]
        customers: u32,

        #[arg(long, default_value_t = 5)]
        drivers: u32,

        #[arg(long, default_value = "Secret123")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let connection = init_redis(&args.redis_url)
        .await
        .with_context(|| format!("connecting to {}", args.redis_url))?;
    let cache = RedisCache::new(connection.clone());
    let repo = RedisRepository::new(connection);

    match args.command {
        Command::VerifyDriver { phone, revoke } => {
            let (user, _) = set_verified(&repo, &cache, &phone, !revoke).await?;

            println!(
                "Driver {} ({}) is now {}",
                user.name,
                user.phone,
                if revoke { "unverified" } else { "verified" }
            );

            Ok(())
        }
        Command::Show { phone } => show(&repo, &phone).await,
        Command::Seed {
            customers,
            drivers,
            password,
        } => seed(&repo, customers, drivers, &password).await,
    }
}

async fn find_user(repo: &dyn Repository, raw_phone: &str) -> anyhow::Result<User> {
    let phone =
        normalize_phone(raw_phone).ok_or_else(|| anyhow!("{raw_phone:?} is not a PH mobile number"))?;

    repo.user_by_phone(&phone)
        .await?
        .ok_or_else(|| anyhow!("No account for {phone}"))
}

/// Revoking also takes the driver offline, in the profile and in the cache.
async fn set_verified(
    repo: &dyn Repository,
    cache: &dyn Cache,
    phone: &str,
    verified: bool,
) -> anyhow::Result<(User, Driver)> {
    let user = find_user(repo, phone).await?;

    let Some(mut driver) = repo.driver_by_user(user.id).await? else {
        bail!("{} is not a driver", user.phone);
    };

    driver.is_verified = verified;
    if !verified {
        driver.is_available = false;
    }
    driver.updated_at = Utc::now();
    repo.save_driver(&driver).await?;

    if !verified {
        cache.del(&keys::driver_available(driver.id)).await?;
    }

    Ok((user, driver))
}

async fn show(repo: &dyn Repository, phone: &str) -> anyhow::Result<()> {
    let user = find_user(repo, phone).await?;
    let driver = repo.driver_by_user(user.id).await?;

    let profile = UserProfile::new(&user, driver.as_ref());
    println!("{}", serde_json::to_string_pretty(&profile)?);

    Ok(())
}

async fn seed(
    repo: &dyn Repository,
    customers: u32,
    drivers: u32,
    password: &str,
) -> anyhow::Result<()> {
    let password_hash = hash_password(password)
        .await
        .map_err(|e| anyhow!("hashing seed password: {e}"))?;

    let pb = ProgressBar::new((customers + drivers) as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut created = 0;
    let mut skipped = 0;

    for n in 1..=customers {
        let user = User::new(
            format!("+63900{n:07}"),
            format!("Customer {n}"),
            None,
            UserType::Customer,
            None,
            AuthMethod::Otp,
        );
        pb.set_message(user.phone.clone());

        match repo.insert_user(&user, None).await {
            Ok(()) => created += 1,
            Err(StoreError::PhoneTaken) => skipped += 1,
            Err(e) => return Err(e.into()),
        }

        pb.inc(1);
    }

    for n in 1..=drivers {
        let user = User::new(
            format!("+63910{n:07}"),
            format!("Driver {n}"),
            None,
            UserType::Driver,
            Some(password_hash.clone()),
            AuthMethod::Password,
        );
        let driver = Driver::new(
            user.id,
            Vehicle {
                vehicle_type: "tricycle".to_string(),
                license_number: format!("N01-00-{n:06}"),
                plate_number: format!("TRC {n:04}"),
            },
        );
        pb.set_message(user.phone.clone());

        match repo.insert_user(&user, Some(&driver)).await {
            Ok(()) => created += 1,
            Err(StoreError::PhoneTaken) => skipped += 1,
            Err(e) => return Err(e.into()),
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");

    println!("Created: {created}");
    println!("Skipped (phone taken): {skipped}");

    Ok(())
}
