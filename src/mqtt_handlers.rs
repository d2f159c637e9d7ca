use std::time::Duration;

use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, MqttOptions, QoS, Transport};
use tokio::sync::mpsc;

use crate::config::{MqttConfig, parse_address};
use crate::data_models::DeviceSnapshot;
use crate::events::SamplerCommand;

// MQTT 连接，并把 {prefix}/{address}/set/{gain|sample_rate} 命令转发给采样任务
pub async fn connect_mqtt(
    config: &MqttConfig,
    cmd_tx: mpsc::Sender<SamplerCommand>,
) -> Result<AsyncClient, Box<dyn std::error::Error>> {
    let mut mqtt_options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    mqtt_options.set_keep_alive(Duration::from_secs(5));
    if let Some(u) = &config.username {
        mqtt_options.set_credentials(u.clone(), config.password.clone().unwrap_or_default());
    }
    mqtt_options.set_transport(Transport::Tcp);

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 10);
    let command_filter = format!("{}/+/set/+", config.topic_prefix);
    let topic_prefix = config.topic_prefix.clone();
    let subscriber = client.clone();

    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                    info!("MQTT 连接成功!");
                    // 重连后需要重新订阅
                    if let Err(e) = subscriber.try_subscribe(command_filter.clone(), QoS::AtLeastOnce) {
                        error!("订阅命令主题失败: {:?}", e);
                    }
                }
                Ok(Event::Incoming(rumqttc::Packet::Publish(p))) => {
                    let payload = String::from_utf8_lossy(&p.payload);
                    match parse_command(&topic_prefix, &p.topic, &payload) {
                        Some(cmd) => {
                            info!("收到命令: {:?}", cmd);
                            if let Err(e) = cmd_tx.send(cmd).await {
                                error!("转发命令到采样任务失败: {:?}", e);
                            }
                        }
                        None => warn!("无法解析的 MQTT 消息: {} = {:?}", p.topic, payload),
                    }
                }
                Ok(Event::Outgoing(rumqttc::Outgoing::PingReq)) => {
                    debug!("MQTT PingReq");
                }
                Ok(event) => {
                    debug!("MQTT Event: {:?}", event);
                }
                Err(e) => {
                    error!("MQTT EventLoop 错误: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    });

    Ok(client)
}

/// Decode a `{prefix}/{address}/set/{gain|sample_rate}` publish.
pub fn parse_command(prefix: &str, topic: &str, payload: &str) -> Option<SamplerCommand> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    let mut parts = rest.split('/');
    let (Some(address), Some("set"), Some(setting), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let address = parse_address(address).ok()?;
    match setting {
        "gain" => Some(SamplerCommand::SetGain {
            address,
            gain: payload.parse().ok()?,
        }),
        "sample_rate" => Some(SamplerCommand::SetSampleRate {
            address,
            sps: payload.trim().parse().ok()?,
        }),
        _ => None,
    }
}

pub async fn publish_snapshot(
    client: &AsyncClient,
    topic_prefix: &str,
    snapshot: &DeviceSnapshot,
) -> Result<(), Box<dyn std::error::Error>> {
    let base_topic = format!("{}/{}", topic_prefix, snapshot.address_label());

    for reading in &snapshot.readings {
        client
            .publish(format!("{}/{}", base_topic, reading.input), QoS::AtLeastOnce, false, reading.volts.to_string())
            .await?;
        client
            .publish(format!("{}/raw/{}", base_topic, reading.input), QoS::AtLeastOnce, false, reading.raw.to_string())
            .await?;
    }
    client
        .publish(format!("{}/json", base_topic), QoS::AtLeastOnce, false, serde_json::to_string(snapshot)?)
        .await?;

    debug!("已发布 {} 个读数到主题 '{}'", snapshot.readings.len(), base_topic);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Gain;

    #[test]
    fn gain_command_is_parsed() {
        assert_eq!(
            parse_command("ads1x15", "ads1x15/0x49/set/gain", "16"),
            Some(SamplerCommand::SetGain {
                address: 0x49,
                gain: Gain::Sixteen
            })
        );
    }

    #[test]
    fn sample_rate_command_is_parsed() {
        assert_eq!(
            parse_command("lab/adc", "lab/adc/0x48/set/sample_rate", "3300"),
            Some(SamplerCommand::SetSampleRate {
                address: 0x48,
                sps: 3300
            })
        );
    }

    #[test]
    fn foreign_or_malformed_topics_are_ignored() {
        assert_eq!(parse_command("ads1x15", "other/0x48/set/gain", "1"), None);
        assert_eq!(parse_command("ads1x15", "ads1x15/0x48/set/gain", "5"), None);
        assert_eq!(parse_command("ads1x15", "ads1x15/0x48/set/mode", "1"), None);
        assert_eq!(parse_command("ads1x15", "ads1x15/0x48/ain0", "1"), None);
        assert_eq!(parse_command("ads1x15", "ads1x15x/0x48/set/gain", "1"), None);
    }
}
