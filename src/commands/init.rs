use crate::{
    InitArgs,
    config::{Config, DEFAULT_CONFIG_FILE},
};

const HEADER: &str = "\
# autopostprod configuration
#
# Every key can be overridden from the environment with the AUTOPOSTPROD__
# prefix and `__` between keys, e.g. AUTOPOSTPROD__GOOGLE__ACCESS_TOKEN.
# Relative paths are resolved against this file's directory.

";

pub async fn run(args: &InitArgs) -> Result<(), anyhow::Error> {
    let path = if args.path.is_relative() {
        std::env::current_dir()?.join(&args.path)
    } else {
        args.path.clone()
    };

    if !path.exists() {
        if args.create {
            tokio::fs::create_dir_all(&path).await?;
            println!("Created directory {path}", path = path.display());
        } else {
            return Err(anyhow::anyhow!(
                "Directory does not exist: {path}",
                path = path.display()
            ));
        }
    }

    let config_file = path.join(DEFAULT_CONFIG_FILE);
    if config_file.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "{config_file} already exists (use --force to overwrite)",
            config_file = config_file.display()
        ));
    }

    tokio::fs::write(&config_file, default_config_text(&args.repository)?).await?;

    println!(
        "Created config file {config_file}",
        config_file = config_file.display()
    );

    Ok(())
}

fn default_config_text(repository: &str) -> Result<String, serde_yaml::Error> {
    let config = Config::for_repository(repository);
    Ok(format!("{HEADER}{}", serde_yaml::to_string(&config)?))
}
