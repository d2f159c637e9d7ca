use std::time::Duration;

use dotenv::dotenv;
use env_logger::{Builder, Target};
use log::{error, info};
use tokio::sync::mpsc;

use ads1x15_daemon::{config::DaemonConfig, events::*, mqtt_handlers::*, sampler::*};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .init();
    info!("ADS1x15 采集程序启动...");
    dotenv().ok(); // 加载 .env 文件

    let config = DaemonConfig::from_env()?;
    info!("MQTT 地址: {}:{}", config.mqtt.host, config.mqtt.port);
    for device in &config.adc.devices {
        info!(
            "ADC: {} 0x{:02x} {:?}, {} SPS, 总线 {}",
            device.variant,
            device.address,
            device.mode,
            device.sample_rate.sps(device.variant.family()),
            config.adc.bus
        );
    }

    // 创建 MPSC 渠道
    let (sampler_cmd_tx, sampler_cmd_rx) = mpsc::channel::<SamplerCommand>(32);
    let (sampler_event_tx, mut sampler_event_rx) = mpsc::channel::<SamplerEvent>(32);

    let mqtt_client = loop {
        match connect_mqtt(&config.mqtt, sampler_cmd_tx.clone()).await {
            Ok(client) => break client,
            Err(e) => {
                error!("MQTT 连接失败: {:?}, 10秒后重试...", e);
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        }
    };

    // 启动采样任务
    tokio::spawn(sampler_task(
        build_devices(&config.adc),
        config.adc.poll_interval,
        sampler_cmd_rx,
        sampler_event_tx,
    ));

    // 主循环，处理采样事件和 MQTT 发布
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("收到 Ctrl+C 信号，正在执行优雅退出...");
                if let Err(e) = sampler_cmd_tx.send(SamplerCommand::Stop).await {
                    error!("发送停止命令到采样任务失败: {:?}", e);
                }
                info!("程序退出。");
                break Ok(());
            }
            Some(event) = sampler_event_rx.recv() => {
                match event {
                    SamplerEvent::Snapshot(snapshot) => {
                        if let Err(e) =
                            publish_snapshot(&mqtt_client, &config.mqtt.topic_prefix, &snapshot).await
                        {
                            error!("MQTT 发布失败: {:?}", e);
                        }
                    }
                    SamplerEvent::Error { address, error } => {
                        // 下个周期会重新打开总线
                        error!("设备 0x{:02x} 读取失败: {}", address, error);
                    }
                }
            }
            else => {
                info!("采样事件流结束，主循环退出。");
                break Ok(());
            }
        }
    }
}
