use std::{net::SocketAddr, sync::Arc};

use teloxide::{
	adaptors::Throttle,
	dispatching::{Dispatcher, UpdateFilterExt},
	dptree,
	error_handlers::LoggingErrorHandler,
	types::Update,
	update_listeners::webhooks,
	Bot,
};

use crate::{
	config::RelaySettings, exchange::ExchangeStore, platforms::Platform, transport::Transport,
};

pub mod caption;
pub mod config;
pub mod correlation;
pub mod error;
pub mod exchange;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod platforms;
pub mod publisher;
pub mod relay_structs;
pub mod telegram;
pub mod tg_handlers;
pub mod thumbnail;
mod timer;
pub mod transport;

#[cfg(test)]
mod test_support;

pub struct Relay {
	pub transport: Arc<dyn Transport>,
	pub platforms: Vec<Arc<dyn Platform>>,
	pub exchange: Arc<ExchangeStore>,
	pub settings: RelaySettings,
}

impl Relay {
	pub fn new(
		transport: Arc<dyn Transport>,
		platforms: Vec<Arc<dyn Platform>>,
		exchange: Arc<ExchangeStore>,
		settings: RelaySettings,
	) -> Self {
		Relay {
			transport,
			platforms,
			exchange,
			settings,
		}
	}
}

pub async fn dispatch(
	bot: Throttle<Bot>,
	relay: Arc<Relay>,
	webhook: Option<(SocketAddr, url::Url)>,
) -> anyhow::Result<()> {
	let update_handler = dptree::entry()
		.branch(Update::filter_channel_post().endpoint(tg_handlers::channel_post))
		.branch(Update::filter_message().endpoint(tg_handlers::linked_message));
	let mut dispatcher = Dispatcher::builder(bot.clone(), update_handler)
		.dependencies(dptree::deps![relay])
		.distribution_function(|_| None::<std::convert::Infallible>)
		.enable_ctrlc_handler()
		.build();
	match webhook {
		Some((addr, url)) => {
			log::info!("listening for updates on {addr}");
			let listener = webhooks::axum(bot, webhooks::Options::new(addr, url)).await?;
			let err_handler = LoggingErrorHandler::new();
			dispatcher.dispatch_with_listener(listener, err_handler).await;
		}
		None => {
			log::info!("polling for updates");
			dispatcher.dispatch().await;
		}
	}
	Ok(())
}
