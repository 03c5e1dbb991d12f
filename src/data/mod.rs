pub mod preference;
pub mod reading;

pub use preference::{AlertPreference, LocationClass, LocationContext};
pub use reading::{
    DeviceHeartbeat, NewDeviceHeartbeat, NewPumpRunTime, NewTemperatureReading, PumpRunTime,
    Sample, TemperatureReading, PUMP_DEVICE_ID,
};
