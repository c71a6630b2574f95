//! Farm API topic table.

pub const FEEDER_SETTINGS: &str = "swinefarm/machine/configurations/update";
pub const DAILY_PLAN: &str = "swinefarm/swine/feeding_plan/response";
pub const ALERT_PARAMETERS: &str = "swinefarm/receive/alert_parameter";

pub const RFID_IDENTIFICATION: &str = "swinefarm/swine/identification/rfid";
pub const CONSUMPTION_LOG: &str = "swinefarm/swine/consumption/log";
pub const ALERTS: &str = "swinefarm/alerts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    // inbound
    FeederSettings,
    DailyPlan,
    AlertParameters,
    // outbound
    RfidIdentification,
    ConsumptionLog,
    Alerts,
}

impl Topic {
    /// Topics the station subscribes to.
    pub const INBOUND: [Topic; 3] = [Self::FeederSettings, Self::DailyPlan, Self::AlertParameters];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FeederSettings => FEEDER_SETTINGS,
            Self::DailyPlan => DAILY_PLAN,
            Self::AlertParameters => ALERT_PARAMETERS,
            Self::RfidIdentification => RFID_IDENTIFICATION,
            Self::ConsumptionLog => CONSUMPTION_LOG,
            Self::Alerts => ALERTS,
        }
    }

    pub fn parse(topic: &str) -> Option<Self> {
        match topic {
            FEEDER_SETTINGS => Some(Self::FeederSettings),
            DAILY_PLAN => Some(Self::DailyPlan),
            ALERT_PARAMETERS => Some(Self::AlertParameters),
            RFID_IDENTIFICATION => Some(Self::RfidIdentification),
            CONSUMPTION_LOG => Some(Self::ConsumptionLog),
            ALERTS => Some(Self::Alerts),
            _ => None,
        }
    }

    pub const fn is_inbound(self) -> bool {
        matches!(
            self,
            Self::FeederSettings | Self::DailyPlan | Self::AlertParameters
        )
    }
}
