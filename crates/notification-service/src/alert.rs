use analysis_core::{EvaluationRecord, SignalDirection, TradeSide};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A high-confidence evaluation rendered for humans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub instrument: String,
    pub direction: SignalDirection,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn from_record(record: &EvaluationRecord) -> Self {
        let signal = &record.signal;
        Self {
            instrument: signal.instrument().to_string(),
            direction: signal.direction(),
            confidence: signal.confidence(),
            timestamp: record.generated_at,
            title: format!(
                "{} {} ({:.1}% confidence)",
                signal.direction().to_label().to_uppercase(),
                signal.instrument(),
                signal.confidence()
            ),
            message: render_message(record),
        }
    }

    /// Embed color: green for buys, red for sells, grey otherwise.
    pub fn color(&self) -> u32 {
        if self.direction.is_buy() {
            0x00ff00
        } else if self.direction.is_sell() {
            0xff0000
        } else {
            0x999999
        }
    }
}

fn render_message(record: &EvaluationRecord) -> String {
    let signal = &record.signal;
    let risk = &record.risk;
    let side = match risk.side() {
        TradeSide::Long => "Long",
        TradeSide::Short => "Short",
    };
    let [t1, t2, t3] = *risk.target_prices();

    let mut message = format!(
        "**Price**: ${:.2}\n\
         **Side**: {}\n\
         **Score**: {:+.3} (agreement {:.0}%)\n\
         **Risk**: {} (30d vol {:.2}%)\n\
         **Stop Loss**: ${:.2} ({:.1}%)\n\
         **Targets**: ${:.2} / ${:.2} / ${:.2}\n\
         **Reward:Risk**: {:.1}:1\n\
         **Position Size**: {:.1}% of capital\n",
        record.current_price,
        side,
        signal.weighted_score(),
        signal.agreement() * 100.0,
        risk.risk_level().to_label(),
        risk.volatility_30d() * 100.0,
        risk.stop_loss_price(),
        risk.stop_pct() * 100.0,
        t1,
        t2,
        t3,
        risk.reward_risk_ratio(),
        risk.position_size_fraction() * 100.0,
    );

    message.push_str("\n**Models**\n");
    for opinion in signal.contributing_opinions() {
        if opinion.is_available() {
            message.push_str(&format!(
                "- {}: {:?} ({:.2})\n",
                opinion.source, opinion.direction, opinion.strength
            ));
        } else {
            message.push_str(&format!("- {}: unavailable\n", opinion.source));
        }
    }
    message
}
