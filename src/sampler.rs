use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use uom::si::electric_potential::volt;

use crate::config::{AdcConfig, ReadMode};
use crate::data_models::{DeviceSnapshot, InputReading};
use crate::device::Ads1x15;
use crate::error::AdcError;
use crate::events::{SamplerCommand, SamplerEvent};
use crate::registers::SampleRate;
use crate::timing::DelayTable;
use crate::transport::{I2cTransport, LinuxI2c};

/// A chip plus the inputs it is scanned on
#[derive(Debug)]
pub struct ManagedDevice<T> {
    pub adc: Ads1x15<T>,
    pub mode: ReadMode,
}

// 按配置创建所有设备，同一总线上的设备各自独立打开/关闭总线
pub fn build_devices(config: &AdcConfig) -> Vec<ManagedDevice<LinuxI2c>> {
    config
        .devices
        .iter()
        .map(|device| {
            let mut adc = Ads1x15::new(config.bus.clone(), device.address, device.variant);
            adc.set_gain(config.gain);
            adc.set_delay_table(DelayTable {
                legacy_860: config.legacy_860_delay,
            });
            adc.set_sample_rate(device.sample_rate);
            ManagedDevice {
                adc,
                mode: device.mode,
            }
        })
        .collect()
}

/// Read every configured input of one device once.
pub fn scan<T: I2cTransport>(device: &mut ManagedDevice<T>) -> Result<DeviceSnapshot, AdcError> {
    let mut readings = Vec::with_capacity(4);
    match device.mode {
        ReadMode::SingleEnded => {
            for channel in 0..4u8 {
                let raw = i32::from(device.adc.read_single_ended(channel)?);
                readings.push(reading(&device.adc, format!("ain{}", channel), raw));
            }
        }
        ReadMode::Differential => {
            let raw = i32::from(device.adc.read_differential_0_1()?);
            readings.push(reading(&device.adc, "diff_0_1".to_string(), raw));
            let raw = i32::from(device.adc.read_differential_2_3()?);
            readings.push(reading(&device.adc, "diff_2_3".to_string(), raw));
        }
    }

    Ok(DeviceSnapshot {
        address: device.adc.address(),
        variant: device.adc.variant(),
        gain: device.adc.gain(),
        sample_rate: device.adc.sample_rate_sps(),
        readings,
        timestamp_ms: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default(),
    })
}

fn reading<T: I2cTransport>(adc: &Ads1x15<T>, input: String, raw: i32) -> InputReading {
    InputReading {
        input,
        raw,
        volts: adc.to_potential(raw).get::<volt>(),
    }
}

fn apply_command<T: I2cTransport>(devices: &mut [ManagedDevice<T>], cmd: &SamplerCommand) {
    let address = match *cmd {
        SamplerCommand::SetGain { address, .. } | SamplerCommand::SetSampleRate { address, .. } => address,
        SamplerCommand::Stop => return,
    };
    let Some(device) = devices.iter_mut().find(|d| d.adc.address() == address) else {
        warn!("未找到地址为 0x{:02x} 的设备，忽略命令 {:?}", address, cmd);
        return;
    };
    match *cmd {
        SamplerCommand::SetGain { gain, .. } => device.adc.set_gain(gain),
        SamplerCommand::SetSampleRate { sps, .. } => {
            match SampleRate::from_sps(sps, device.adc.variant().family()) {
                Some(rate) => device.adc.set_sample_rate(rate),
                None => {
                    warn!("设备 0x{:02x} ({}) 不支持 {} SPS，忽略命令", address, device.adc.variant(), sps);
                    return;
                }
            }
        }
        SamplerCommand::Stop => {}
    }
    info!(
        "设备 0x{:02x} 已更新: 增益 {}, 采样率 {} SPS",
        address,
        device.adc.gain(),
        device.adc.sample_rate_sps()
    );
}

// 采样任务：定时在阻塞线程中扫描所有设备
pub async fn sampler_task<T>(
    mut devices: Vec<ManagedDevice<T>>,
    interval: Duration,
    mut cmd_rx: mpsc::Receiver<SamplerCommand>,
    event_tx: mpsc::Sender<SamplerEvent>,
) where
    T: I2cTransport + Send + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!("采样任务启动, {} 个设备, 周期 {:?}", devices.len(), interval);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SamplerCommand::Stop) => {
                        info!("采样任务收到停止命令。");
                        return;
                    }
                    Some(cmd) => apply_command(&mut devices, &cmd),
                    None => {
                        info!("命令通道关闭，采样任务退出。");
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                let batch = std::mem::take(&mut devices);
                let scanned = tokio::task::spawn_blocking(move || {
                    let mut batch = batch;
                    let results: Vec<_> = batch
                        .iter_mut()
                        .map(|device| (device.adc.address(), scan(device)))
                        .collect();
                    (batch, results)
                })
                .await;

                let results = match scanned {
                    Ok((batch, results)) => {
                        devices = batch;
                        results
                    }
                    Err(e) => {
                        error!("采样线程异常退出: {:?}", e);
                        return;
                    }
                };

                for (address, result) in results {
                    let event = match result {
                        Ok(snapshot) => {
                            debug!("设备 0x{:02x} 采样完成: {:?}", address, snapshot.readings);
                            SamplerEvent::Snapshot(snapshot)
                        }
                        Err(error) => {
                            error!("设备 0x{:02x} 采样失败: {}", address, error);
                            SamplerEvent::Error { address, error }
                        }
                    };
                    if let Err(e) = event_tx.send(event).await {
                        error!("发送采样事件失败: {:?}", e);
                        return;
                    }
                }
            }
        }
    }
}
