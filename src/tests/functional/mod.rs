// Licensed under the Apache-2.0 license

mod dispatch_scenarios;
mod memory_device;
mod wire_loopback;
