//! 车辆状态机。
//!
//! 转移表是“某状态下哪些事件合法”的唯一来源：表中不存在的
//! `(状态, 事件)` 组合一律视为非法，调用方必须按拒绝处理。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 车辆状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    Reserved,
    Unavailable,
    Removed,
    Inactive,
    Trip,
    Elsewhere,
}

impl VehicleStatus {
    pub const ALL: [VehicleStatus; 7] = [
        VehicleStatus::Available,
        VehicleStatus::Reserved,
        VehicleStatus::Unavailable,
        VehicleStatus::Removed,
        VehicleStatus::Inactive,
        VehicleStatus::Trip,
        VehicleStatus::Elsewhere,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::Reserved => "reserved",
            VehicleStatus::Unavailable => "unavailable",
            VehicleStatus::Removed => "removed",
            VehicleStatus::Inactive => "inactive",
            VehicleStatus::Trip => "trip",
            VehicleStatus::Elsewhere => "elsewhere",
        }
    }

    /// 终止状态没有任何出边。
    pub fn is_terminal(&self) -> bool {
        matches!(self, VehicleStatus::Inactive)
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 车辆事件类型（线上格式为 snake_case 字符串）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleEventType {
    AgencyDropOff,
    AgencyPickUp,
    BatteryCharged,
    BatteryLow,
    CommsLost,
    CommsRestored,
    Deregister,
    Maintenance,
    MaintenancePickUp,
    OffHours,
    OnHours,
    ProviderDropOff,
    RebalancePickUp,
    Register,
    ReservationCancel,
    ReservationStart,
    ServiceEnd,
    ServiceStart,
    TripCancel,
    TripEnd,
    TripEnter,
    TripLeave,
    TripStart,
}

impl VehicleEventType {
    pub const ALL: [VehicleEventType; 23] = [
        VehicleEventType::AgencyDropOff,
        VehicleEventType::AgencyPickUp,
        VehicleEventType::BatteryCharged,
        VehicleEventType::BatteryLow,
        VehicleEventType::CommsLost,
        VehicleEventType::CommsRestored,
        VehicleEventType::Deregister,
        VehicleEventType::Maintenance,
        VehicleEventType::MaintenancePickUp,
        VehicleEventType::OffHours,
        VehicleEventType::OnHours,
        VehicleEventType::ProviderDropOff,
        VehicleEventType::RebalancePickUp,
        VehicleEventType::Register,
        VehicleEventType::ReservationCancel,
        VehicleEventType::ReservationStart,
        VehicleEventType::ServiceEnd,
        VehicleEventType::ServiceStart,
        VehicleEventType::TripCancel,
        VehicleEventType::TripEnd,
        VehicleEventType::TripEnter,
        VehicleEventType::TripLeave,
        VehicleEventType::TripStart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleEventType::AgencyDropOff => "agency_drop_off",
            VehicleEventType::AgencyPickUp => "agency_pick_up",
            VehicleEventType::BatteryCharged => "battery_charged",
            VehicleEventType::BatteryLow => "battery_low",
            VehicleEventType::CommsLost => "comms_lost",
            VehicleEventType::CommsRestored => "comms_restored",
            VehicleEventType::Deregister => "deregister",
            VehicleEventType::Maintenance => "maintenance",
            VehicleEventType::MaintenancePickUp => "maintenance_pick_up",
            VehicleEventType::OffHours => "off_hours",
            VehicleEventType::OnHours => "on_hours",
            VehicleEventType::ProviderDropOff => "provider_drop_off",
            VehicleEventType::RebalancePickUp => "rebalance_pick_up",
            VehicleEventType::Register => "register",
            VehicleEventType::ReservationCancel => "reservation_cancel",
            VehicleEventType::ReservationStart => "reservation_start",
            VehicleEventType::ServiceEnd => "service_end",
            VehicleEventType::ServiceStart => "service_start",
            VehicleEventType::TripCancel => "trip_cancel",
            VehicleEventType::TripEnd => "trip_end",
            VehicleEventType::TripEnter => "trip_enter",
            VehicleEventType::TripLeave => "trip_leave",
            VehicleEventType::TripStart => "trip_start",
        }
    }

    /// 解析线上事件类型；未知类型返回 `None`。
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == value)
    }

    /// 会开启（或在本辖区内重新开启）一段行程的事件。
    pub fn opens_trip(&self) -> bool {
        matches!(self, VehicleEventType::TripStart | VehicleEventType::TripEnter)
    }

    /// 必须引用一段已知行程的生命周期事件。
    pub fn continues_trip(&self) -> bool {
        matches!(
            self,
            VehicleEventType::TripEnter | VehicleEventType::TripLeave | VehicleEventType::TripEnd
        )
    }

    /// 所有与行程相关的事件（需要 trip_id）。
    pub fn is_trip_event(&self) -> bool {
        matches!(
            self,
            VehicleEventType::TripStart
                | VehicleEventType::TripEnter
                | VehicleEventType::TripLeave
                | VehicleEventType::TripEnd
                | VehicleEventType::TripCancel
        )
    }

    /// 按策略允许不携带遥测样本的事件。
    pub fn telemetry_optional(&self) -> bool {
        matches!(
            self,
            VehicleEventType::Register | VehicleEventType::Deregister | VehicleEventType::CommsLost
        )
    }
}

impl fmt::Display for VehicleEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 事件隐含的目标状态（首次见到设备时使用，也是质量检查中的“状态映射”）。
pub fn status_for(event: VehicleEventType) -> VehicleStatus {
    use VehicleEventType as E;
    use VehicleStatus as S;
    match event {
        E::AgencyDropOff | E::BatteryCharged | E::OnHours | E::ProviderDropOff => S::Available,
        E::ReservationCancel | E::ServiceStart | E::TripCancel | E::TripEnd => S::Available,
        E::CommsRestored => S::Available,
        E::ReservationStart => S::Reserved,
        E::BatteryLow | E::Maintenance | E::OffHours | E::ServiceEnd | E::CommsLost => {
            S::Unavailable
        }
        E::AgencyPickUp | E::MaintenancePickUp | E::RebalancePickUp | E::Register => S::Removed,
        E::Deregister => S::Inactive,
        E::TripStart | E::TripEnter => S::Trip,
        E::TripLeave => S::Elsewhere,
    }
}

/// 状态转移：`None` 表示该组合不在转移表中（非法）。
pub fn next_state(current: VehicleStatus, event: VehicleEventType) -> Option<VehicleStatus> {
    use VehicleEventType as E;
    use VehicleStatus as S;
    let next = match (current, event) {
        (S::Inactive, _) => return None,
        (_, E::Deregister) => S::Inactive,
        (_, E::CommsLost) => S::Unavailable,

        (S::Available, E::ReservationStart) => S::Reserved,
        (S::Available, E::TripStart) => S::Trip,
        (S::Available, E::BatteryLow | E::Maintenance | E::OffHours | E::ServiceEnd) => {
            S::Unavailable
        }
        (S::Available, E::AgencyPickUp | E::MaintenancePickUp | E::RebalancePickUp) => S::Removed,

        (S::Reserved, E::TripStart) => S::Trip,
        (S::Reserved, E::ReservationCancel) => S::Available,

        (S::Unavailable, E::BatteryCharged | E::OnHours | E::ServiceStart | E::CommsRestored) => {
            S::Available
        }
        (S::Unavailable, E::AgencyPickUp | E::MaintenancePickUp | E::RebalancePickUp) => {
            S::Removed
        }

        (S::Removed, E::AgencyDropOff | E::ProviderDropOff) => S::Available,

        (S::Trip, E::TripEnd | E::TripCancel) => S::Available,
        (S::Trip, E::TripLeave) => S::Elsewhere,

        (S::Elsewhere, E::TripEnter) => S::Trip,
        (S::Elsewhere, E::TripEnd) => S::Elsewhere,
        (S::Elsewhere, E::AgencyPickUp | E::RebalancePickUp) => S::Removed,

        _ => return None,
    };
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_start_is_legal_from_available_and_reserved() {
        assert_eq!(
            next_state(VehicleStatus::Available, VehicleEventType::TripStart),
            Some(VehicleStatus::Trip)
        );
        assert_eq!(
            next_state(VehicleStatus::Reserved, VehicleEventType::TripStart),
            Some(VehicleStatus::Trip)
        );
        assert_eq!(
            next_state(VehicleStatus::Removed, VehicleEventType::TripStart),
            None
        );
    }

    #[test]
    fn deregister_reaches_terminal_inactive() {
        for status in VehicleStatus::ALL {
            let next = next_state(status, VehicleEventType::Deregister);
            if status.is_terminal() {
                assert_eq!(next, None);
            } else {
                assert_eq!(next, Some(VehicleStatus::Inactive));
            }
        }
        for event in VehicleEventType::ALL {
            assert_eq!(next_state(VehicleStatus::Inactive, event), None);
        }
    }

    #[test]
    fn event_type_parse_matches_wire_names() {
        for event in VehicleEventType::ALL {
            assert_eq!(VehicleEventType::parse(event.as_str()), Some(event));
            let json = serde_json::to_string(&event).expect("serialize");
            assert_eq!(json, format!("\"{}\"", event.as_str()));
        }
        assert_eq!(VehicleEventType::parse("teleport"), None);
    }
}
