use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "convoy")]
#[command(author = "Convoy Team")]
#[command(version = "0.1.0")]
#[command(about = "Real-time group location coordination server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP/WebSocket server and the movement simulator
    Serve {
        /// Directory holding default.toml and environment overlays
        #[arg(short, long, default_value = "config", env = "CONVOY_CONFIG_DIR")]
        config: String,

        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Seed an in-memory directory with a demo group and print member tokens
        #[arg(long, default_value_t = false)]
        demo: bool,
    },
    /// Great-circle distance in kilometres between two points
    Distance {
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        #[arg(allow_negative_numbers = true)]
        lng1: f64,
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        #[arg(allow_negative_numbers = true)]
        lng2: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from(["convoy", "serve", "--port", "8080", "--demo"]);
        match cli.command {
            Commands::Serve { config, port, demo } => {
                assert_eq!(config, "config");
                assert_eq!(port, Some(8080));
                assert!(demo);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_distance_with_negative_coordinates() {
        let cli = Cli::parse_from(["convoy", "distance", "-33.86", "151.2", "51.5", "-0.12"]);
        match cli.command {
            Commands::Distance { lat1, lng2, .. } => {
                assert_eq!(lat1, -33.86);
                assert_eq!(lng2, -0.12);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
