//! Shared XML fixtures for protocol parser tests.

/// Builds a ZoneGroupMember XML element.
pub(crate) fn zone_member_xml(
    uuid: &str,
    ip: &str,
    zone_name: &str,
    channel_map: Option<&str>,
) -> String {
    let channel_attr = channel_map
        .map(|m| format!(r#" ChannelMapSet="{m}""#))
        .unwrap_or_default();
    format!(
        r#"<ZoneGroupMember UUID="{uuid}" Location="http://{ip}:1400/xml/device_description.xml" ZoneName="{zone_name}"{channel_attr} />"#
    )
}

/// Wraps member elements into a ZoneGroup XML element.
pub(crate) fn zone_group_xml(id: &str, coordinator_uuid: &str, members: &[String]) -> String {
    format!(
        r#"<ZoneGroup Coordinator="{coordinator_uuid}" ID="{id}">{}</ZoneGroup>"#,
        members.join("")
    )
}

/// A stereo-pair zone: two players sharing the room "Kitchen", with the
/// LF channel on RINCON_A01400.
pub(crate) const ZONE_GROUP_STATE_STEREO: &str = r#"<ZoneGroups><ZoneGroup Coordinator="RINCON_A01400" ID="RINCON_A01400:17"><ZoneGroupMember UUID="RINCON_A01400" Location="http://192.168.1.10:1400/xml/device_description.xml" ZoneName="Kitchen" ChannelMapSet="RINCON_A01400:LF,LF;RINCON_B01400:RF,RF" /><ZoneGroupMember UUID="RINCON_B01400" Location="http://192.168.1.11:1400/xml/device_description.xml" ZoneName="Kitchen" ChannelMapSet="RINCON_A01400:LF,LF;RINCON_B01400:RF,RF" /></ZoneGroup></ZoneGroups>"#;

/// A trimmed but structurally faithful device description document.
pub(crate) const DEVICE_DESCRIPTION_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:ZonePlayer:1</deviceType>
    <friendlyName>192.168.1.10 - Sonos One</friendlyName>
    <modelNumber>S13</modelNumber>
    <modelName>Sonos One</modelName>
    <UDN>uuid:RINCON_B8E937ECE1F001400</UDN>
    <roomName>Kitchen</roomName>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ZoneGroupTopology:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ZoneGroupTopology</serviceId>
        <controlURL>/ZoneGroupTopology/Control</controlURL>
        <eventSubURL>/ZoneGroupTopology/Event</eventSubURL>
        <SCPDURL>/xml/ZoneGroupTopology1.xml</SCPDURL>
      </service>
    </serviceList>
    <deviceList>
      <device>
        <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
        <friendlyName>192.168.1.10 - Sonos One Media Server</friendlyName>
        <UDN>uuid:RINCON_B8E937ECE1F001400_MS</UDN>
        <serviceList>
          <service>
            <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
            <serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>
            <controlURL>/MediaServer/ContentDirectory/Control</controlURL>
            <eventSubURL>/MediaServer/ContentDirectory/Event</eventSubURL>
            <SCPDURL>/xml/ContentDirectory1.xml</SCPDURL>
          </service>
        </serviceList>
      </device>
      <device>
        <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
        <friendlyName>Kitchen - Sonos One Media Renderer</friendlyName>
        <UDN>uuid:RINCON_B8E937ECE1F001400_MR</UDN>
        <serviceList>
          <service>
            <serviceType>urn:schemas-upnp-org:service:RenderingControl:1</serviceType>
            <serviceId>urn:upnp-org:serviceId:RenderingControl</serviceId>
            <controlURL>/MediaRenderer/RenderingControl/Control</controlURL>
            <eventSubURL>/MediaRenderer/RenderingControl/Event</eventSubURL>
            <SCPDURL>/xml/RenderingControl1.xml</SCPDURL>
          </service>
          <service>
            <serviceType>urn:schemas-upnp-org:service:AVTransport:1</serviceType>
            <serviceId>urn:upnp-org:serviceId:AVTransport</serviceId>
            <controlURL>/MediaRenderer/AVTransport/Control</controlURL>
            <eventSubURL>/MediaRenderer/AVTransport/Event</eventSubURL>
            <SCPDURL>/xml/AVTransport1.xml</SCPDURL>
          </service>
          <service>
            <serviceType>urn:schemas-upnp-org:service:GroupRenderingControl:1</serviceType>
            <serviceId>urn:upnp-org:serviceId:GroupRenderingControl</serviceId>
            <controlURL>/MediaRenderer/GroupRenderingControl/Control</controlURL>
            <eventSubURL>/MediaRenderer/GroupRenderingControl/Event</eventSubURL>
            <SCPDURL>/xml/GroupRenderingControl1.xml</SCPDURL>
          </service>
        </serviceList>
      </device>
    </deviceList>
  </device>
</root>"#;

/// A DIDL-Lite document with two file-backed tracks.
pub(crate) const DIDL_TWO_TRACKS: &str = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"><item id="Q:0/1" parentID="Q:0" restricted="true"><res protocolInfo="x-file-cifs:*:audio/flac:*" duration="0:03:42">x-file-cifs://nas/music/harvest_moon.flac</res><upnp:albumArtURI>/getaa?u=x-file-cifs%3a%2f%2fnas%2fmusic%2fharvest_moon.flac</upnp:albumArtURI><dc:title>Harvest Moon</dc:title><upnp:class>object.item.audioItem.musicTrack</upnp:class><dc:creator>Neil Young</dc:creator><upnp:album>Harvest Moon</upnp:album></item><item id="Q:0/2" parentID="Q:0" restricted="true"><res protocolInfo="x-file-cifs:*:audio/flac:*" duration="0:04:05">x-file-cifs://nas/music/unknown_legend.flac</res><dc:title>Unknown Legend</dc:title><upnp:class>object.item.audioItem.musicTrack</upnp:class><dc:creator>Neil Young</dc:creator><upnp:album>Harvest Moon</upnp:album></item></DIDL-Lite>"#;

/// An AVTransport NOTIFY body whose LastChange reports PLAYING with a
/// current track and entity-encoded DIDL metadata.
pub(crate) const AV_TRANSPORT_NOTIFY: &str = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <LastChange>&lt;Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/"&gt;&lt;InstanceID val="0"&gt;&lt;TransportState val="PLAYING"/&gt;&lt;CurrentTrackURI val="x-file-cifs://nas/music/harvest_moon.flac"/&gt;&lt;CurrentTrackDuration val="0:03:42"/&gt;&lt;CurrentTrackMetaData val="&amp;lt;DIDL-Lite xmlns:dc=&amp;quot;http://purl.org/dc/elements/1.1/&amp;quot; xmlns:upnp=&amp;quot;urn:schemas-upnp-org:metadata-1-0/upnp/&amp;quot; xmlns=&amp;quot;urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/&amp;quot;&amp;gt;&amp;lt;item id=&amp;quot;-1&amp;quot; parentID=&amp;quot;-1&amp;quot;&amp;gt;&amp;lt;dc:title&amp;gt;Harvest Moon&amp;lt;/dc:title&amp;gt;&amp;lt;dc:creator&amp;gt;Neil Young&amp;lt;/dc:creator&amp;gt;&amp;lt;upnp:album&amp;gt;Harvest Moon&amp;lt;/upnp:album&amp;gt;&amp;lt;/item&amp;gt;&amp;lt;/DIDL-Lite&amp;gt;"/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange>
  </e:property>
</e:propertyset>"#;

/// A RenderingControl NOTIFY body from a stereo pair: LF/RF at 50,
/// Master at 60, unmuted.
pub(crate) const RENDERING_NOTIFY_STEREO: &str = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <LastChange>&lt;Event xmlns="urn:schemas-upnp-org:metadata-1-0/RCS/"&gt;&lt;InstanceID val="0"&gt;&lt;Volume channel="LF" val="50"/&gt;&lt;Volume channel="RF" val="50"/&gt;&lt;Volume channel="Master" val="60"/&gt;&lt;Mute channel="Master" val="0"/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange>
  </e:property>
</e:propertyset>"#;

/// A ZoneGroupTopology NOTIFY body embedding the stereo-pair topology.
pub(crate) fn topology_notify_body(zone_group_state: &str) -> String {
    let escaped = crate::utils::escape_xml(zone_group_state);
    format!(
        r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <ZoneGroupState>{escaped}</ZoneGroupState>
  </e:property>
</e:propertyset>"#
    )
}
