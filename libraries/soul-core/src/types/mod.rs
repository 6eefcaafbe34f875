mod audio;
mod device;

pub use audio::{AudioFormat, ChannelMask, SampleRate};
pub use device::{IoHandle, OutputDevices, OutputFlags, SessionId};
