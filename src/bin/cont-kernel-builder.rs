use anyhow::{Context, Result};
use cont_kernel_builder::{logging, BuildConfig, KernelBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Build,
    Clean,
    Usage,
}

fn usage() -> &'static str {
    "Usage:\n  cont-kernel-builder          patch and build the container kernel\n  cont-kernel-builder clean    remove the container's kernel build directory\n\nThe build config is read from $CONT_KERNEL_CONFIG, or ./cont-kernel.toml."
}

fn parse_command(args: &[String]) -> Command {
    match args {
        [] => Command::Build,
        [clean] if clean == "clean" => Command::Clean,
        _ => Command::Usage,
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    logging::init();

    match parse_command(&args) {
        Command::Build => build(),
        Command::Clean => clean_build(),
        Command::Usage => {
            println!("{}", usage());
            Ok(())
        }
    }
}

fn builder() -> Result<KernelBuilder> {
    let config = BuildConfig::load_default()?;
    KernelBuilder::new(&config)
        .with_context(|| format!("preparing kernel build for container {}", config.container.id))
}

fn build() -> Result<()> {
    let mut builder = builder()?;
    let image = builder.build()?;
    println!("[kernel:cont{}] image at {}", builder.container_id(), image.display());
    Ok(())
}

fn clean_build() -> Result<()> {
    let builder = builder()?;
    if builder.clean()? {
        println!(
            "[kernel:cont{}] removed {}",
            builder.container_id(),
            builder.build_dir().display()
        );
    } else {
        println!("[kernel:cont{}] nothing to clean", builder.container_id());
    }
    Ok(())
}
