//! A subcommand making sure various things are working. Useful for updating
//! Emporium where you want to check as many things as possible as early as
//! possible.

use crate::{
    api,
    args::{self, Args},
    config::Config,
    db,
    load_config_and_init_logger,
    prelude::*,
};


pub(crate) async fn run(shared: &args::Shared, args: &Args) -> Result<()> {
    let config = load_config_and_init_logger(shared, args)
        .context("failed to load config: cannot proceed with `check` command")?;


    // Perform main checks
    info!("Starting to verify various things...");
    let referenced_files = check_referenced_files(&config).await;
    let db = check_db(&config).await;
    let schema = api::registry::verify(&api::root_node());
    info!("Done verifing various things");


    // Print summary after all log output
    let mut any_errors = false;
    println!();
    bunt::println!("{$bold+blue+intense}Summary{/$}");
    println!();
    print_outcome(&mut any_errors, "Load configuration", &Ok(()));
    print_outcome(&mut any_errors, "Checking all referenced files", &referenced_files);
    print_outcome(&mut any_errors, "Connection to DB", &db);
    print_outcome(&mut any_errors, "Field registry matches API schema", &schema);

    println!();
    if any_errors {
        bunt::println!("{$red+intense}➡  Errors have occured!{/$}");
        std::process::exit(1);
    } else {
        bunt::println!("{$green+intense}⮕  Everything OK{/$} \
            {$dimmed}(Emporium probably works in this environment){/$}");
        println!("   ");
        Ok(())
    }
}

fn print_outcome<T>(any_errors: &mut bool, label: &str, result: &Result<T>) {
    match result {
        Ok(_) => {
            bunt::println!(" ▸ {[bold+intense]}  {$green+bold}✔ ok{/$}", label);
        }
        Err(e) => {
            *any_errors = true;
            bunt::println!(" ▸ {[bold+intense]}  {$red+bold}✘ error{/$}", label);
            bunt::println!("      {$red}▶▶▶ {$bold}Error:{/$}{/$} {[yellow+intense]}", e);
            println!();
            bunt::println!("      {$red+italic}Caused by:{/$}");

            for (i, cause) in e.chain().skip(1).enumerate() {
                print!("       {: >1$}", "", i * 2);
                println!("‣ {cause}");
            }
            println!();
        }
    }
}

async fn check_referenced_files(config: &Config) -> Result<()> {
    config.db.check_server_cert()?;

    // The log file is created on demand, so only its directory has to exist.
    if let Some(dir) = config.log.file.as_ref().and_then(|f| f.parent()) {
        if !dir.as_os_str().is_empty() {
            debug!("Trying to access '{}'...", dir.display());
            tokio::fs::metadata(dir)
                .await
                .context(format!("could not access log directory '{}'", dir.display()))?;
        }
    }

    Ok(())
}

async fn check_db(config: &Config) -> Result<()> {
    let pool = db::create_pool(&config.db).await?;
    let conn = pool.get().await?;
    conn.query_one("select 1", &[]).await.context("test query failed")?;
    Ok(())
}
