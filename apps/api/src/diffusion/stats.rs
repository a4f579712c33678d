//! Delivery statistics aggregated from channel counters.
//! Counters are written by the external sender; this is read-only.

use serde::Serialize;

use crate::diffusion::labels::channel_label;
use crate::models::campaign::{CampaignChannel, ChannelType};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChannelStats {
    pub channel_type: ChannelType,
    pub label: &'static str,
    pub sent: i64,
    pub delivered: i64,
    pub clicks: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CampaignStats {
    pub total_sent: i64,
    pub total_delivered: i64,
    pub total_failed: i64,
    pub total_clicks: i64,
    /// Percent of sent messages that were delivered, one decimal.
    pub delivery_rate: f64,
    /// Percent of delivered messages that were clicked, one decimal.
    pub click_rate: f64,
    pub channels: Vec<ChannelStats>,
}

pub fn compute_campaign_stats(channels: &[CampaignChannel]) -> CampaignStats {
    let total_sent: i64 = channels.iter().map(|c| c.sent_count).sum();
    let total_delivered: i64 = channels.iter().map(|c| c.delivered_count).sum();
    let total_failed: i64 = channels.iter().map(|c| c.failed_count).sum();
    let total_clicks: i64 = channels.iter().map(|c| c.click_count).sum();

    CampaignStats {
        total_sent,
        total_delivered,
        total_failed,
        total_clicks,
        delivery_rate: percent(total_delivered, total_sent),
        click_rate: percent(total_clicks, total_delivered),
        channels: channels
            .iter()
            .map(|c| ChannelStats {
                channel_type: c.channel_type,
                label: channel_label(c.channel_type),
                sent: c.sent_count,
                delivered: c.delivered_count,
                clicks: c.click_count,
            })
            .collect(),
    }
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    let raw = part as f64 / whole as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}
