use anyhow::{Context, Result};
use libloading::Library;
use once_cell::sync::OnceCell;
use std::ffi::{c_void, CString};
use std::os::raw::{c_char, c_float, c_int, c_uint, c_ulong};
use std::path::Path;

use crate::error::HeadsetError;
use crate::headset::{CommandSource, HeadsetEvent, TrainingControl, TrainingEvent};
use crate::types::MentalCommand;

const EDK_OK: c_int = 0x0000;
const EDK_NO_EVENT: c_int = 0x0600;

// IEE_Event_t
const IEE_USER_ADDED: c_int = 0x0010;
const IEE_USER_REMOVED: c_int = 0x0020;
const IEE_EMO_STATE_UPDATED: c_int = 0x0040;
const IEE_MENTAL_COMMAND_EVENT: c_int = 0x0100;

// IEE_MentalCommandEvent_t
const MC_TRAINING_STARTED: c_int = 1;
const MC_TRAINING_SUCCEEDED: c_int = 2;
const MC_TRAINING_FAILED: c_int = 3;
const MC_TRAINING_COMPLETED: c_int = 4;
const MC_TRAINING_DATA_ERASED: c_int = 5;
const MC_TRAINING_REJECTED: c_int = 6;
const MC_TRAINING_RESET: c_int = 7;

const DEVICE_ID: &str = "Emotiv Systems-5";
// per-poll cap
const MAX_EVENTS_PER_POLL: usize = 64;

type Handle = *mut c_void;

struct EdkApi {
    #[allow(dead_code)]
    lib: Library,
    engine_connect: unsafe extern "C" fn(*const c_char) -> c_int,
    engine_disconnect: unsafe extern "C" fn() -> c_int,
    event_create: unsafe extern "C" fn() -> Handle,
    event_free: unsafe extern "C" fn(Handle),
    state_create: unsafe extern "C" fn() -> Handle,
    state_free: unsafe extern "C" fn(Handle),
    next_event: unsafe extern "C" fn(Handle) -> c_int,
    event_type: unsafe extern "C" fn(Handle) -> c_int,
    event_user_id: unsafe extern "C" fn(Handle, *mut c_uint) -> c_int,
    event_emo_state: unsafe extern "C" fn(Handle, Handle) -> c_int,
    current_action: unsafe extern "C" fn(Handle) -> c_int,
    current_action_power: unsafe extern "C" fn(Handle) -> c_float,
    mental_command_event_type: unsafe extern "C" fn(Handle) -> c_int,
    set_active_actions: unsafe extern "C" fn(c_uint, c_ulong) -> c_int,
    set_training_action: unsafe extern "C" fn(c_uint, c_int) -> c_int,
    set_training_control: unsafe extern "C" fn(c_uint, c_int) -> c_int,
    save_user_profile: unsafe extern "C" fn(c_uint, *const c_char) -> c_int,
    load_user_profile: unsafe extern "C" fn(c_uint, *const c_char) -> c_int,
}

impl EdkApi {
    fn load() -> Result<Self> {
        let name = libloading::library_filename("edk");
        let lib = unsafe { Library::new(&name) }
            .with_context(|| format!("{} not found next to the executable", name.to_string_lossy()))?;
        // Safety: signatures follow the EDK 3.x C headers (Iedk.h, IEmoStateDLL.h).
        unsafe {
            Ok(Self {
                engine_connect: *lib.get(b"IEE_EngineConnect\0")?,
                engine_disconnect: *lib.get(b"IEE_EngineDisconnect\0")?,
                event_create: *lib.get(b"IEE_EmoEngineEventCreate\0")?,
                event_free: *lib.get(b"IEE_EmoEngineEventFree\0")?,
                state_create: *lib.get(b"IEE_EmoStateCreate\0")?,
                state_free: *lib.get(b"IEE_EmoStateFree\0")?,
                next_event: *lib.get(b"IEE_EngineGetNextEvent\0")?,
                event_type: *lib.get(b"IEE_EmoEngineEventGetType\0")?,
                event_user_id: *lib.get(b"IEE_EmoEngineEventGetUserId\0")?,
                event_emo_state: *lib.get(b"IEE_EmoEngineEventGetEmoState\0")?,
                current_action: *lib.get(b"IS_MentalCommandGetCurrentAction\0")?,
                current_action_power: *lib.get(b"IS_MentalCommandGetCurrentActionPower\0")?,
                mental_command_event_type: *lib.get(b"IEE_MentalCommandEventGetType\0")?,
                set_active_actions: *lib.get(b"IEE_MentalCommandSetActiveActions\0")?,
                set_training_action: *lib.get(b"IEE_MentalCommandSetTrainingAction\0")?,
                set_training_control: *lib.get(b"IEE_MentalCommandSetTrainingControl\0")?,
                save_user_profile: *lib.get(b"IEE_SaveUserProfile\0")?,
                load_user_profile: *lib.get(b"IEE_LoadUserProfile\0")?,
                lib,
            })
        }
    }

    fn instance() -> Result<&'static EdkApi> {
        static API: OnceCell<EdkApi> = OnceCell::new();
        API.get_or_try_init(Self::load)
    }

    fn check(code: c_int, call: &'static str) -> Result<(), HeadsetError> {
        if code == EDK_OK {
            Ok(())
        } else {
            Err(HeadsetError::Sdk { call, code })
        }
    }
}

fn training_event(code: c_int) -> Option<TrainingEvent> {
    match code {
        MC_TRAINING_STARTED => Some(TrainingEvent::Started),
        MC_TRAINING_SUCCEEDED => Some(TrainingEvent::Succeeded),
        MC_TRAINING_FAILED => Some(TrainingEvent::Failed),
        MC_TRAINING_COMPLETED => Some(TrainingEvent::Completed),
        MC_TRAINING_DATA_ERASED => Some(TrainingEvent::DataErased),
        MC_TRAINING_REJECTED => Some(TrainingEvent::Rejected),
        MC_TRAINING_RESET => Some(TrainingEvent::Reset),
        _ => None,
    }
}

fn path_cstring(path: &Path) -> Result<CString, HeadsetError> {
    let text = path.to_string_lossy();
    CString::new(text.as_bytes()).map_err(|_| HeadsetError::InvalidPath(text.into_owned()))
}

/// Live EmoEngine session backed by the vendor EDK shared library.
pub struct EmotivHeadset {
    api: &'static EdkApi,
    event: Handle,
    state: Handle,
    user_id: u32,
    announced: bool,
}

impl EmotivHeadset {
    pub fn connect() -> Result<Self, HeadsetError> {
        let api = EdkApi::instance()
            .map_err(|e| HeadsetError::LibraryUnavailable(format!("{e:#}")))?;
        let device = CString::new(DEVICE_ID).map_err(|_| HeadsetError::InvalidPath(DEVICE_ID.into()))?;
        EdkApi::check(
            unsafe { (api.engine_connect)(device.as_ptr()) },
            "IEE_EngineConnect",
        )?;
        let (event, state) = unsafe { ((api.event_create)(), (api.state_create)()) };
        log::info!("EmoEngine connected");
        Ok(Self {
            api,
            event,
            state,
            user_id: 0,
            announced: false,
        })
    }

    fn read_event(&mut self) -> Result<Option<HeadsetEvent>, HeadsetError> {
        let api = self.api;
        let kind = unsafe { (api.event_type)(self.event) };
        let mut user: c_uint = 0;
        unsafe { (api.event_user_id)(self.event, &mut user as *mut c_uint) };
        let event = match kind {
            IEE_USER_ADDED => {
                self.user_id = user;
                Some(HeadsetEvent::UserAdded(user))
            }
            IEE_USER_REMOVED => Some(HeadsetEvent::UserRemoved(user)),
            IEE_EMO_STATE_UPDATED => {
                EdkApi::check(
                    unsafe { (api.event_emo_state)(self.event, self.state) },
                    "IEE_EmoEngineEventGetEmoState",
                )?;
                let bits = unsafe { (api.current_action)(self.state) } as u32;
                let power = unsafe { (api.current_action_power)(self.state) };
                let action = MentalCommand::from_bits(bits).unwrap_or(MentalCommand::Neutral);
                Some(HeadsetEvent::CommandUpdated { action, power })
            }
            IEE_MENTAL_COMMAND_EVENT => {
                let code = unsafe { (api.mental_command_event_type)(self.event) };
                training_event(code).map(HeadsetEvent::Training)
            }
            _ => None,
        };
        Ok(event)
    }
}

impl CommandSource for EmotivHeadset {
    fn name(&self) -> &'static str {
        "Emotiv"
    }

    fn poll(&mut self) -> Result<Vec<HeadsetEvent>, HeadsetError> {
        let mut events = Vec::new();
        if !self.announced {
            self.announced = true;
            events.push(HeadsetEvent::Connected);
        }
        for _ in 0..MAX_EVENTS_PER_POLL {
            let code = unsafe { (self.api.next_event)(self.event) };
            if code == EDK_NO_EVENT {
                break;
            }
            EdkApi::check(code, "IEE_EngineGetNextEvent")?;
            if let Some(event) = self.read_event()? {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn set_active_actions(&mut self, mask: u32) -> Result<(), HeadsetError> {
        EdkApi::check(
            unsafe { (self.api.set_active_actions)(self.user_id, mask as c_ulong) },
            "IEE_MentalCommandSetActiveActions",
        )
    }

    fn set_training_action(&mut self, action: MentalCommand) -> Result<(), HeadsetError> {
        EdkApi::check(
            unsafe { (self.api.set_training_action)(self.user_id, action.bits() as c_int) },
            "IEE_MentalCommandSetTrainingAction",
        )
    }

    fn set_training_control(&mut self, control: TrainingControl) -> Result<(), HeadsetError> {
        EdkApi::check(
            unsafe { (self.api.set_training_control)(self.user_id, control.code()) },
            "IEE_MentalCommandSetTrainingControl",
        )
    }

    fn save_profile(&mut self, path: &Path) -> Result<(), HeadsetError> {
        let c_path = path_cstring(path)?;
        EdkApi::check(
            unsafe { (self.api.save_user_profile)(self.user_id, c_path.as_ptr()) },
            "IEE_SaveUserProfile",
        )
    }

    fn load_profile(&mut self, path: &Path) -> Result<(), HeadsetError> {
        let c_path = path_cstring(path)?;
        EdkApi::check(
            unsafe { (self.api.load_user_profile)(self.user_id, c_path.as_ptr()) },
            "IEE_LoadUserProfile",
        )
    }
}

impl Drop for EmotivHeadset {
    fn drop(&mut self) {
        unsafe {
            (self.api.state_free)(self.state);
            (self.api.event_free)(self.event);
            (self.api.engine_disconnect)();
        }
        log::info!("EmoEngine disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_codes_map_to_events() {
        assert_eq!(training_event(1), Some(TrainingEvent::Started));
        assert_eq!(training_event(6), Some(TrainingEvent::Rejected));
        assert_eq!(training_event(0), None);
        assert_eq!(training_event(9), None);
    }

    #[test]
    fn interior_nul_in_path_is_rejected() {
        let bad = Path::new("bad\0name.emu");
        assert!(matches!(path_cstring(bad), Err(HeadsetError::InvalidPath(_))));
    }
}
