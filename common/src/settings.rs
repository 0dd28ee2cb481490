//! Helper for modules that track the operator settings published on the bus

use std::sync::Arc;

use caryatid_sdk::Subscription;
use tokio::sync::Mutex;

use crate::messages::Message;
use crate::types::GaugeSettings;

/// Drive a settings-update subscription, mirroring each published update into
/// the shared settings slot. Returns when the subscription closes.
pub async fn follow(
    mut subscription: Box<dyn Subscription<Message>>,
    shared: Arc<Mutex<GaugeSettings>>,
) {
    loop {
        let Ok((_, message)) = subscription.read().await else {
            return;
        };
        if let Message::SettingsUpdated(update) = message.as_ref() {
            *shared.lock().await = update.settings.clone();
        }
    }
}
