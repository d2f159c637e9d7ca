use crate::data_models::DeviceSnapshot;
use crate::error::AdcError;
use crate::registers::Gain;

// 采样任务命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerCommand {
    SetGain { address: u8, gain: Gain },
    /// Rate in SPS, resolved against the target chip's family
    SetSampleRate { address: u8, sps: u16 },
    Stop,
}

// 采样任务事件
#[derive(Debug)]
pub enum SamplerEvent {
    Snapshot(DeviceSnapshot),
    Error { address: u8, error: AdcError },
}
