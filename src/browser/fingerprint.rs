//! Fingerprint generation and the anti-detection init script injected into
//! every stealth session, both ported from the original stealth browser
//! service.

use crate::models::BrowserFingerprint;
use rand::seq::SliceRandom;

/// The subset of `BrowserFingerprint` the driver needs at context-creation
/// time (user agent, viewport, locale) kept separate from the full model so
/// `src/browser/driver.rs` doesn't depend on `src/models.rs` for session
/// bookkeeping it doesn't use.
pub struct BrowserFingerprintSpec<'a> {
    pub user_agent: &'a str,
    pub viewport: (u32, u32),
    pub locale: &'a str,
    pub timezone: &'a str,
}

impl BrowserFingerprint {
    pub fn as_spec(&self) -> BrowserFingerprintSpec<'_> {
        BrowserFingerprintSpec {
            user_agent: &self.user_agent,
            viewport: self.viewport,
            locale: &self.locale,
            timezone: &self.timezone,
        }
    }
}

struct UaProfile {
    user_agent: &'static str,
    platform: &'static str,
    viewport: (u32, u32),
}

const UA_PROFILES: &[UaProfile] = &[
    UaProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        platform: "Win32",
        viewport: (1920, 1080),
    },
    UaProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        platform: "MacIntel",
        viewport: (1440, 900),
    },
    UaProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        platform: "Linux x86_64",
        viewport: (1366, 768),
    },
];

const TIMEZONES: &[&str] = &[
    "America/New_York",
    "America/Los_Angeles",
    "Europe/London",
    "Europe/Berlin",
];

const LOCALES: &[&str] = &["en-US", "en-GB", "de-DE", "fr-FR"];

const HARDWARE_CONCURRENCY: &[u32] = &[4, 8, 12, 16];
const DEVICE_MEMORY: &[u32] = &[4, 8, 16, 32];

const WEBGL_RENDERERS: &[&str] = &[
    "ANGLE (Intel, Intel(R) UHD Graphics 620 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    "ANGLE (NVIDIA, NVIDIA GeForce GTX 1060 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    "ANGLE (AMD, AMD Radeon RX 580 Direct3D11 vs_5_0 ps_5_0, D3D11)",
];

/// Draws a randomized, internally-consistent fingerprint from the pool of
/// realistic profiles.
pub fn generate_fingerprint() -> BrowserFingerprint {
    let mut rng = rand::thread_rng();
    let profile = UA_PROFILES.choose(&mut rng).expect("non-empty");

    BrowserFingerprint {
        user_agent: profile.user_agent.to_string(),
        viewport: profile.viewport,
        screen: profile.viewport,
        timezone: (*TIMEZONES.choose(&mut rng).expect("non-empty")).to_string(),
        locale: (*LOCALES.choose(&mut rng).expect("non-empty")).to_string(),
        platform: profile.platform.to_string(),
        hardware_concurrency: *HARDWARE_CONCURRENCY.choose(&mut rng).expect("non-empty"),
        device_memory: *DEVICE_MEMORY.choose(&mut rng).expect("non-empty"),
        webgl_vendor: "Google Inc. (Intel)".to_string(),
        webgl_renderer: (*WEBGL_RENDERERS.choose(&mut rng).expect("non-empty")).to_string(),
    }
}

/// Renders the anti-automation init script for a given fingerprint: hides
/// `navigator.webdriver`, spoofs plugins/languages/hardware/platform/screen,
/// overrides WebGL vendor/renderer, adds canvas/imageData noise, neutralizes
/// permission-query and performance.now fingerprinting, and pins the
/// timezone reported by `Intl.DateTimeFormat`.
pub fn stealth_script(fp: &BrowserFingerprint) -> String {
    format!(
        r#"
        Object.defineProperty(navigator, 'webdriver', {{
            get: () => undefined,
        }});

        Object.defineProperty(navigator, 'plugins', {{
            get: () => [{{
                0: {{
                    type: "application/x-google-chrome-pdf",
                    suffixes: "pdf",
                    description: "Portable Document Format",
                    enabledPlugin: Plugin
                }}
            }}],
        }});

        Object.defineProperty(navigator, 'languages', {{
            get: () => ['{locale}', 'en-US', 'en'],
        }});

        Object.defineProperty(navigator, 'hardwareConcurrency', {{
            get: () => {hw},
        }});

        Object.defineProperty(navigator, 'deviceMemory', {{
            get: () => {mem},
        }});

        Object.defineProperty(navigator, 'platform', {{
            get: () => '{platform}',
        }});

        Object.defineProperty(screen, 'width', {{ get: () => {sw}, }});
        Object.defineProperty(screen, 'height', {{ get: () => {sh}, }});
        Object.defineProperty(screen, 'availWidth', {{ get: () => {sw}, }});
        Object.defineProperty(screen, 'availHeight', {{ get: () => {sh} - 40, }});

        const getParameter = WebGLRenderingContext.prototype.getParameter;
        WebGLRenderingContext.prototype.getParameter = function(parameter) {{
            if (parameter === 37445) {{ return '{webgl_vendor}'; }}
            if (parameter === 37446) {{ return '{webgl_renderer}'; }}
            return getParameter(parameter);
        }};

        const originalToDataURL = HTMLCanvasElement.prototype.toDataURL;
        HTMLCanvasElement.prototype.toDataURL = function() {{
            const originalData = originalToDataURL.apply(this, arguments);
            return originalData.slice(0, -10) + Math.random().toString(36).substr(2, 9);
        }};

        const originalGetImageData = CanvasRenderingContext2D.prototype.getImageData;
        CanvasRenderingContext2D.prototype.getImageData = function() {{
            const originalImageData = originalGetImageData.apply(this, arguments);
            const data = originalImageData.data;
            for (let i = 0; i < data.length; i += 4) {{
                data[i] = data[i] + Math.floor(Math.random() * 3) - 1;
            }}
            return originalImageData;
        }};

        const originalQuery = Permissions.prototype.query;
        Permissions.prototype.query = function(parameters) {{
            return originalQuery.apply(this, arguments).then(result => {{
                if (parameters.name === 'notifications') {{ result.state = 'default'; }}
                return result;
            }});
        }};

        window.chrome = {{ runtime: {{ onConnect: null, onMessage: null }} }};

        const originalNow = Performance.prototype.now;
        Performance.prototype.now = function() {{
            return originalNow.apply(this, arguments) + Math.random() * 0.1;
        }};

        const originalResolvedOptions = Intl.DateTimeFormat.prototype.resolvedOptions;
        Intl.DateTimeFormat.prototype.resolvedOptions = function() {{
            const options = originalResolvedOptions.apply(this, arguments);
            options.timeZone = '{timezone}';
            return options;
        }};
        "#,
        locale = fp.locale,
        hw = fp.hardware_concurrency,
        mem = fp.device_memory,
        platform = fp.platform,
        sw = fp.screen.0,
        sh = fp.screen.1,
        webgl_vendor = fp.webgl_vendor,
        webgl_renderer = fp.webgl_renderer,
        timezone = fp.timezone,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_fingerprint_has_matching_screen_and_viewport() {
        let fp = generate_fingerprint();
        assert_eq!(fp.viewport, fp.screen);
    }

    #[test]
    fn stealth_script_embeds_the_fingerprint_timezone() {
        let fp = generate_fingerprint();
        let script = stealth_script(&fp);
        assert!(script.contains(&fp.timezone));
        assert!(script.contains("navigator, 'webdriver'"));
    }
}
