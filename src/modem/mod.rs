/*!
Text and device transports for pulse recordings.

A device is anything that can send a [Recording](crate::broadlink::Recording) out or hand one
back, a codec turns a recording into a single line of text:

```text
lines:hex     Broadlink packet, hex encoded
lines:base64  Broadlink packet, base64 encoded (what SmartIR stores)
lines:raw     +mark -space ... in microseconds, also accepts IrTransmogrifier's Freq=...[...]
```
*/

pub mod codecs;
pub use codecs::{create_codec, Codec, CodecError, CodecType};

pub mod devices;
pub use devices::{create_device, Device, DeviceError, DeviceType, Lines};
