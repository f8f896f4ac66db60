use std::io::Write;
use std::sync::Arc;

use anyhow::bail;
use media_relay::{
	config::Config, exchange::ExchangeStore, platforms, telegram::TelegramTransport, Relay,
};
use teloxide::{adaptors::throttle::Limits, prelude::RequesterExt, Bot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
		.format(|buf, record| {
			writeln!(
				buf,
				"{} - {}:{} - [{}] {}",
				chrono::offset::Local::now().format("%Y-%m-%dT%H:%M:%S"),
				record.file().unwrap_or("unknown"),
				record.line().unwrap_or(0),
				record.level(),
				record.args()
			)
		})
		.init();

	let config_path = std::env::args().nth(1).unwrap_or_else(|| "pero.toml".to_string());
	let config = Config::load(&config_path)?;

	let platforms = platforms::from_config(&config)?;
	if platforms.is_empty() {
		bail!("no platform enabled in {config_path}");
	}
	log::info!(
		"platforms enabled: {}",
		platforms.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
	);

	let bot = Bot::new(&config.telegram_token).throttle(Limits::default());
	let transport = Arc::new(TelegramTransport::new(bot.clone()).await?);

	let exchange = Arc::new(ExchangeStore::new());
	let sweeper = exchange
		.clone()
		.spawn_sweeper(config.relay.sweep_interval(), config.relay.exchange_ttl());

	let webhook = config.webhook()?;
	let relay = Arc::new(Relay::new(transport, platforms, exchange, config.relay));
	let res = media_relay::dispatch(bot, relay, webhook).await;
	sweeper.abort();
	res
}
