use crate::models::campaign::{CampaignStatus, ChannelType, PaymentStatus};

pub fn status_label(status: CampaignStatus) -> &'static str {
    match status {
        CampaignStatus::Draft => "Brouillon",
        CampaignStatus::PendingPayment => "En attente de paiement",
        CampaignStatus::PaymentApproved => "Paiement validé",
        CampaignStatus::InProgress => "En cours",
        CampaignStatus::Completed => "Terminée",
        CampaignStatus::Cancelled => "Annulée",
    }
}

pub fn payment_status_label(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "En attente",
        PaymentStatus::WaitingProof => "En attente de preuve",
        PaymentStatus::Approved => "Approuvé",
        PaymentStatus::Rejected => "Rejeté",
    }
}

pub fn channel_label(channel: ChannelType) -> &'static str {
    match channel {
        ChannelType::Email => "Email",
        ChannelType::Sms => "SMS",
        ChannelType::Whatsapp => "WhatsApp",
    }
}
