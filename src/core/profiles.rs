//! Profile, attribute and parameter names understood by the gateway.

/// Default API namespace.
pub const DEFAULT_API: &str = "gotapi";
/// Last path segment of the event socket endpoint.
pub const WEBSOCKET_ENDPOINT: &str = "websocket";

/// Profiles requested when an application does not name its own scopes.
pub const INIT_SCOPES: &[&str] = &[
    "servicediscovery",
    "serviceinformation",
    "system",
    "battery",
    "connection",
    "deviceorientation",
    "filedescriptor",
    "file",
    "mediaplayer",
    "mediastreamrecording",
    "notification",
    "phone",
    "proximity",
    "setting",
    "vibration",
    "light",
    "remotecontroller",
    "drivecontroller",
    "mhealth",
    "sphero",
    "dice",
    "temperature",
    "camera",
    "canvas",
    "health",
    "touch",
    "humandetection",
    "keyevent",
    "omnidirectionalimage",
    "tv",
    "powermeter",
    "humidity",
    "illuminance",
    "videochat",
    "airconditioner",
    "gpio",
    "ecg",
    "stressEstimation",
    "poseEstimation",
    "walkState",
    "messagehook",
    "atmosphericPressure",
    "geolocation",
    "echonetLite",
    "power",
    "fabo",
    "mouse",
    "keyboard",
    "device",
];

pub mod common {
    pub const PARAM_ACTION: &str = "action";
    pub const PARAM_SERVICE_ID: &str = "serviceId";
    pub const PARAM_PLUGIN_ID: &str = "pluginId";
    pub const PARAM_PROFILE: &str = "profile";
    pub const PARAM_INTERFACE: &str = "interface";
    pub const PARAM_ATTRIBUTE: &str = "attribute";
    pub const PARAM_SESSION_KEY: &str = "sessionKey";
    pub const PARAM_ACCESS_TOKEN: &str = "accessToken";
    pub const PARAM_RESULT: &str = "result";
    pub const PARAM_ERROR_CODE: &str = "errorCode";
    pub const PARAM_ERROR_MESSAGE: &str = "errorMessage";
    pub const PARAM_NONCE: &str = "nonce";
    pub const PARAM_HMAC: &str = "hmac";
}

pub mod authorization {
    pub const PROFILE_NAME: &str = "authorization";
    pub const ATTR_GRANT: &str = "grant";
    pub const ATTR_ACCESS_TOKEN: &str = "accesstoken";
    pub const PARAM_CLIENT_ID: &str = "clientId";
    pub const PARAM_SCOPE: &str = "scope";
    pub const PARAM_APPLICATION_NAME: &str = "applicationName";
    pub const PARAM_ACCESS_TOKEN: &str = "accessToken";
}

pub mod availability {
    pub const PROFILE_NAME: &str = "availability";
    pub const PARAM_VERSION: &str = "version";
}

pub mod battery {
    pub const PROFILE_NAME: &str = "battery";
    pub const ATTR_CHARGING: &str = "charging";
    pub const ATTR_LEVEL: &str = "level";
    pub const ATTR_ON_CHARGING_CHANGE: &str = "onchargingchange";
    pub const ATTR_ON_BATTERY_CHANGE: &str = "onbatterychange";
}

pub mod key_event {
    pub const PROFILE_NAME: &str = "keyevent";
    pub const ATTR_ON_DOWN: &str = "ondown";
    pub const ATTR_ON_UP: &str = "onup";
    pub const ATTR_ON_KEY_CHANGE: &str = "onkeychange";
}

pub mod notification {
    pub const PROFILE_NAME: &str = "notification";
    pub const ATTR_NOTIFY: &str = "notify";
    pub const ATTR_ON_CLICK: &str = "onclick";
    pub const ATTR_ON_SHOW: &str = "onshow";
    pub const ATTR_ON_CLOSE: &str = "onclose";
}

pub mod media_stream_recording {
    pub const PROFILE_NAME: &str = "mediastreamrecording";
    pub const ATTR_MEDIARECORDER: &str = "mediarecorder";
    pub const ATTR_TAKE_PHOTO: &str = "takephoto";
    pub const ATTR_RECORD: &str = "record";
    pub const ATTR_STOP: &str = "stop";
    pub const ATTR_PREVIEW: &str = "preview";
    pub const ATTR_ON_PHOTO: &str = "onphoto";
    pub const ATTR_ON_RECORDING_CHANGE: &str = "onrecordingchange";
}

pub mod service_discovery {
    pub const PROFILE_NAME: &str = "servicediscovery";
    pub const ATTR_ON_SERVICE_CHANGE: &str = "onservicechange";
}

pub mod service_information {
    pub const PROFILE_NAME: &str = "serviceinformation";
}

pub mod system {
    pub const PROFILE_NAME: &str = "system";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_scopes_are_unique() {
        let unique: HashSet<&str> = INIT_SCOPES.iter().copied().collect();
        assert_eq!(unique.len(), INIT_SCOPES.len());
        assert_eq!(INIT_SCOPES.len(), 49);
    }
}
