//! Hardcoded Filters
//!
//! Compiled-in domain and keyword tables. This is the floor of the
//! fallback chain: it needs no initialization, performs no I/O and cannot
//! fail, so blocking keeps working even when every rule source is missing.

use crate::url::{host_of, is_subdomain_of};

/// Major ad and tracking hostnames. Subdomains are blocked too.
pub const HARDCODED_DOMAINS: &[&str] = &[
    // Google
    "doubleclick.net",
    "googlesyndication.com",
    "googleadservices.com",
    "google-analytics.com",
    "googletagmanager.com",
    "googletagservices.com",
    "adservice.google.com",
    "pagead2.googlesyndication.com",
    "2mdn.net",
    "admob.com",
    "adsense.com",
    "imasdk.googleapis.com",
    "googleads.g.doubleclick.net",
    "app-measurement.com",
    "firebase-settings.crashlytics.com",

    // Meta
    "connect.facebook.net",
    "pixel.facebook.com",
    "an.facebook.com",
    "graph.instagram.com",

    // Microsoft
    "ads.microsoft.com",
    "bat.bing.com",
    "clarity.ms",
    "c.bing.com",
    "adnxs.com",
    "adnxs-simple.com",

    // Amazon
    "amazon-adsystem.com",
    "assoc-amazon.com",
    "aax.amazon-adsystem.com",
    "c.amazon-adsystem.com",

    // X / Twitter
    "ads-twitter.com",
    "analytics.twitter.com",
    "ads-api.twitter.com",
    "static.ads-twitter.com",

    // Other social
    "ads.linkedin.com",
    "px.ads.linkedin.com",
    "snap.licdn.com",
    "ads.pinterest.com",
    "ct.pinterest.com",
    "log.pinterest.com",
    "ads.tiktok.com",
    "analytics.tiktok.com",
    "business-api.tiktok.com",
    "sc-static.net",
    "tr.snapchat.com",
    "ads.reddit.com",
    "events.reddit.com",
    "alb.reddit.com",
    "ads.yahoo.com",
    "analytics.yahoo.com",
    "gemini.yahoo.com",
    "advertising.com",
    "adtech.de",
    "adtechus.com",

    // Exchanges / SSPs / DSPs
    "adsrvr.org",
    "rubiconproject.com",
    "pubmatic.com",
    "openx.net",
    "openx.com",
    "criteo.com",
    "criteo.net",
    "casalemedia.com",
    "indexww.com",
    "contextweb.com",
    "33across.com",
    "sharethrough.com",
    "triplelift.com",
    "3lift.com",
    "sovrn.com",
    "lijit.com",
    "gumgum.com",
    "media.net",
    "yieldmo.com",
    "smartadserver.com",
    "sascdn.com",
    "adform.net",
    "adformdn.net",
    "teads.tv",
    "teads.com",
    "improvedigital.com",
    "360yield.com",
    "spotxchange.com",
    "spotx.tv",
    "springserve.com",
    "freewheel.tv",
    "fwmrm.net",
    "stickyadstv.com",
    "yieldlab.net",
    "adition.com",
    "emxdgt.com",
    "districtm.io",
    "rhythmone.com",
    "1rx.io",
    "undertone.com",
    "conversantmedia.com",
    "dotomi.com",
    "mathtag.com",
    "mediamath.com",
    "bidswitch.net",
    "bidswitch.com",
    "turn.com",
    "adroll.com",
    "nextroll.com",
    "quantcast.com",
    "quantserve.com",
    "quantcount.com",
    "simpli.fi",
    "eyeota.net",
    "bluekai.com",
    "demdex.net",
    "krxd.net",
    "exelator.com",
    "crwdcntrl.net",
    "lotame.com",
    "agkn.com",
    "tapad.com",
    "rlcdn.com",
    "liveramp.com",
    "adsymptotic.com",
    "adgrx.com",
    "zemanta.com",
    "outbrain.com",
    "outbrainimg.com",
    "taboola.com",
    "taboolasyndication.com",
    "revcontent.com",
    "mgid.com",
    "adblade.com",
    "nativo.com",
    "ntv.io",
    "plista.com",
    "ligatus.com",
    "yieldbot.com",
    "bidr.io",
    "beeswax.com",
    "adkernel.com",
    "adnium.com",
    "adspirit.de",
    "admixer.net",
    "adriver.ru",
    "begun.ru",
    "yandexadexchange.net",
    "an.yandex.ru",
    "mc.yandex.ru",
    "adfox.ru",
    "adhigh.net",
    "propellerads.com",
    "propellerclick.com",
    "popads.net",
    "popcash.net",
    "adcash.com",
    "exoclick.com",
    "exosrv.com",
    "juicyads.com",
    "trafficjunky.net",
    "trafficjunky.com",
    "trafficfactory.biz",
    "plugrush.com",
    "adsterra.com",
    "hilltopads.net",
    "clickadu.com",
    "onclickads.net",
    "onclkds.com",
    "zeropark.com",
    "richpush.co",
    "pushcrew.com",
    "pushwoosh.com",
    "clickaine.com",
    "admaven.com",
    "ad-maven.com",
    "adskeeper.co.uk",
    "adskeeper.com",
    "bidvertiser.com",
    "infolinks.com",
    "chitika.com",
    "chitika.net",
    "buysellads.com",
    "carbonads.com",
    "carbonads.net",
    "viglink.com",
    "skimlinks.com",
    "skimresources.com",
    "awin1.com",
    "zanox.com",
    "linksynergy.com",
    "commission-junction.com",
    "anrdoezrs.net",
    "dpbolvw.net",
    "jdoqocy.com",
    "kqzyfj.com",
    "tkqlhce.com",
    "emjcd.com",
    "shareasale.com",
    "impactradius.com",
    "partnerize.com",
    "pepperjam.com",
    "pjtra.com",
    "tradedoubler.com",
    "webgains.com",
    "avantlink.com",
    "flexoffers.com",

    // Analytics / session replay
    "hotjar.com",
    "hotjar.io",
    "mixpanel.com",
    "segment.io",
    "segment.com",
    "cdn.segment.com",
    "amplitude.com",
    "fullstory.com",
    "mouseflow.com",
    "crazyegg.com",
    "luckyorange.com",
    "luckyorange.net",
    "inspectlet.com",
    "smartlook.com",
    "logrocket.com",
    "logrocket.io",
    "heap.io",
    "heapanalytics.com",
    "kissmetrics.com",
    "kissmetrics.io",
    "woopra.com",
    "chartbeat.com",
    "chartbeat.net",
    "parsely.com",
    "parse.ly",
    "comscore.com",
    "scorecardresearch.com",
    "imrworldwide.com",
    "omtrdc.net",
    "2o7.net",
    "adobedtm.com",
    "everesttech.net",
    "tealiumiq.com",
    "tiqcdn.com",
    "ensighten.com",
    "optimizely.com",
    "vwo.com",
    "visualwebsiteoptimizer.com",
    "abtasty.com",
    "kameleoon.com",
    "statcounter.com",
    "histats.com",
    "clicky.com",
    "getclicky.com",
    "static.getclicky.com",
    "gosquared.com",
    "matomo.cloud",
    "piwik.pro",
    "yandex.metrika.ru",
    "top.mail.ru",
    "counter.yadro.ru",
    "liveinternet.ru",
    "hit.gemius.pl",
    "gemius.pl",
    "webtrends.com",
    "webtrendslive.com",
    "coremetrics.com",
    "newrelic.com",
    "nr-data.net",
    "bugsnag.com",
    "sentry.io",
    "sentry-cdn.com",
    "trackjs.com",
    "rollbar.com",
    "raygun.io",
    "speedcurve.com",
    "pingdom.net",
    "keen.io",
    "clevertap.com",
    "wzrkt.com",
    "branch.io",
    "appsflyer.com",
    "appsflyersdk.com",
    "adjust.com",
    "adjust.io",
    "kochava.com",
    "singular.net",
    "tenjin.io",
    "tenjin.com",
    "mparticle.com",
    "braze.com",
    "appboy.com",
    "leanplum.com",
    "localytics.com",
    "flurry.com",
    "data.flurry.com",
    "crashlytics.com",
    "apptentive.com",
    "onesignal.com",
    "urbanairship.com",
    "iterable.com",
    "intercomcdn.com",
    "drift.com",
    "hs-analytics.net",
    "hs-banner.com",
    "hsadspixel.net",
    "hubspot.net",
    "track.hubspot.com",
    "hscollectedforms.net",
    "marketo.net",
    "mktoresp.com",
    "pardot.com",
    "pi.pardot.com",
    "eloqua.com",
    "en25.com",
    "salesforceliveagent.com",
    "exacttarget.com",
    "bronto.com",
    "klaviyo.com",
    "list-manage.com",
    "chimpstatic.com",

    // Verification / brand safety
    "moatads.com",
    "moat.com",
    "doubleverify.com",
    "adsafeprotected.com",
    "iasds01.com",
    "integralads.com",
    "serving-sys.com",
    "sizmek.com",
    "flashtalking.com",
    "innovid.com",
    "extreme-reach.com",
    "jivox.com",
    "celtra.com",
    "adgear.com",

    // Consent / fingerprint / identity
    "id5-sync.com",
    "liveintent.com",
    "pippio.com",
    "intentiq.com",
    "adsrvr.com",
    "uidapi.com",
    "zeotap.com",
    "the-ozone-project.com",
    "permutive.com",
    "permutive.app",
    "onetag-sys.com",
    "connectad.io",
    "a-mo.net",
    "adtelligent.com",
    "vidazoo.com",
    "sonobi.com",
    "kargo.com",
    "justpremium.com",
    "seedtag.com",
    "adnuntius.com",
    "smaato.net",
    "smaato.com",
    "inmobi.com",
    "inmobicdn.net",
    "mopub.com",
    "applovin.com",
    "applvn.com",
    "unityads.unity3d.com",
    "vungle.com",
    "chartboost.com",
    "ironsrc.com",
    "supersonicads.com",
    "startapp.com",
    "tapjoy.com",
    "adcolony.com",
    "fyber.com",
    "digitalturbine.com",
    "mintegral.com",
    "rayjump.com",
    "pangle.io",
    "pangolin-sdk-toutiao.com",
    "bytedance-ads.com",
    "ads.yieldmo.com",
    "ad.doubleclick.net",
    "stats.g.doubleclick.net",
    "securepubads.g.doubleclick.net",
    "partner.googleadservices.com",
    "www.googletagservices.com",
    "tpc.googlesyndication.com",
    "adclick.g.doubleclick.net",
    "cm.g.doubleclick.net",

    // Misc trackers
    "addthis.com",
    "addthisedge.com",
    "sharethis.com",
    "gigya.com",
    "disqusads.com",
    "zergnet.com",
    "trafficstars.com",
    "tsyndicate.com",
    "ero-advertising.com",
    "adxpansion.com",
    "xxxlnk.com",
    "adspyglass.com",
    "traffichaus.com",
    "adtng.com",
    "bongacams-ads.com",
    "adverticum.net",
    "adocean.pl",
    "gemhu.adocean.pl",
    "netmng.com",
    "adnet.de",
    "yieldlove.com",
    "ad-srv.net",
    "adsnative.com",
    "adzerk.net",
    "adzerk.com",
    "adbutler.com",
    "servedbyadbutler.com",
    "adspeed.com",
    "adspeed.net",
    "revive-adserver.net",
    "adglare.net",
    "ad-score.com",
    "adscore.com",
    "clickcease.com",
    "fraudlogix.com",
    "pixalate.com",
    "whiteops.com",
    "perimeterx.net",
    "mediavine.com",
    "adthrive.com",
    "ezoic.net",
    "ezodn.com",
    "ezojs.com",
    "monumetric.com",
    "freestar.com",
    "freestar.io",
    "pubnation.com",
    "playwire.com",
    "snigel.com",
    "venatus.com",
    "nitropay.com",
    "adinplay.com",
    "primis.tech",
    "connatix.com",
    "jwpltx.com",
    "aniview.com",
    "vdo.ai",
    "unruly.co",
    "unrulymedia.com",
    "tremorhub.com",
    "tremorvideo.com",
    "telaria.com",
    "videohub.tv",
    "synacor.com",
    "zedo.com",
    "tribalfusion.com",
    "exponential.com",
    "burstnet.com",
    "valueclick.com",
    "valueclickmedia.com",
    "fastclick.net",
    "mediaplex.com",
    "atdmt.com",
    "atwola.com",
    "adsonar.com",
    "tacoda.net",
    "adblade.net",
    "pulse360.com",
    "yieldmanager.com",
    "yieldmanager.net",
    "rightmedia.com",
    "interclick.com",
    "specificclick.net",
    "specificmedia.com",
    "adbrite.com",
    "adbureau.net",
    "admeld.com",
    "adinterax.com",
    "adsdk.com",
    "adserver.yahoo.com",
    "bannersnack.com",
    "casale.com",
    "clicksor.com",
    "clickxchange.com",
    "cpxinteractive.com",
    "directtrack.com",
    "doubleclick.com",
    "etargetnet.com",
    "fimserve.com",
    "gorillanation.com",
    "hitbox.com",
    "intellitxt.com",
    "kontera.com",
    "lucidmedia.com",
    "mediaforge.com",
    "mookie1.com",
    "nexac.com",
    "obeus.com",
    "oewabox.at",
    "onestat.com",
    "openadstream.com",
    "oridian.com",
    "overture.com",
    "pointroll.com",
    "quigo.com",
    "realmedia.com",
    "revsci.net",
    "rovion.com",
    "sitemeter.com",
    "tradetracker.net",
    "trafficmp.com",
    "tynt.com",
    "vibrantmedia.com",
    "wtlive.com",
    "xiti.com",
    "yadro.ru",
    "zanox-affiliate.de",
    "adition.net",
    "adsplats.com",
    "adup-tech.com",
    "criteo.fr",
    "smartclip.net",
    "stroeer.de",
    "emetriq.de",
    "theadex.com",
    "xplosion.de",
    "adalliance.io",
    "ioam.de",
    "infonline.de",
    "nuggad.net",
    "meetrics.net",
    "mxcdn.net",
    "weborama.fr",
    "weborama.com",
    "adverline.com",
    "ligatus.de",
    "nativendo.de",
    "twiago.com",
    "uimserv.net",
    "yieldr.com",
    "sublime.xyz",
    "improve-digital.com",
    "adhese.com",
    "adhese.be",
    "adpone.com",
    "adman.gr",
    "adnet.biz",
    "admatic.com.tr",
    "adform.com",
    "cxense.com",
    "piano.io",
    "tinypass.com",
    "npttech.com",
    "pubfig.io",
    "amplify.outbrain.com",
    "log.outbrain.com",
    "trc.taboola.com",
    "cdn.taboola.com",
    "widgets.outbrain.com",
    "static.criteo.net",
    "bidder.criteo.com",
    "dis.criteo.com",
    "sslwidget.criteo.com",
    "ib.adnxs.com",
    "secure.adnxs.com",
    "acdn.adnxs.com",
    "prebid.adnxs.com",
    "fastlane.rubiconproject.com",
    "pixel.rubiconproject.com",
    "ads.pubmatic.com",
    "image2.pubmatic.com",
    "hbopenbid.pubmatic.com",
    "rtb.openx.net",
    "us-u.openx.net",
    "u.openx.net",
    "ads.stickyadstv.com",
    "sync.teads.tv",
    "a.teads.tv",
    "cdn.teads.tv",
    "match.adsrvr.org",
    "insight.adsrvr.org",
    "js.adsrvr.org",
    "pixel.quantserve.com",
    "secure.quantserve.com",
    "sb.scorecardresearch.com",
    "b.scorecardresearch.com",
    "px.moatads.com",
    "z.moatads.com",
    "pixel.adsafeprotected.com",
    "static.adsafeprotected.com",
    "cdn.doubleverify.com",
    "tps.doubleverify.com",
    "bs.serving-sys.com",
    "ds.serving-sys.com",
    "cdn.flashtalking.com",
    "servedby.flashtalking.com",
    "s.innovid.com",
    "ad.atdmt.com",
    "view.atdmt.com",
    "ads.avocet.io",
    "avocet.io",
    "adlightning.com",
    "confiant-integrations.net",
    "geoedge.be",
    "clean.io",
];

/// URL substrings that identify ad or tracking requests
pub const HARDCODED_KEYWORDS: &[&str] = &[
    // Ad-related paths
    "/ads/",
    "/adserver/",
    "/adserve/",
    "/advertisement",
    "/adframe",
    "/pagead/",
    "/banners/ad",
    "/sponsored-content/",
    "/tracking",
    "/tracker/",
    "/pixel.gif",
    "/beacon/",
    "/collect?v=",
    "/gtag/js",
    "/analytics.js",
    "/ga.js",
    "/fbevents.js",
    "/prebid",

    // Well-known ad brands showing up on first-party paths
    "doubleclick",
    "googlesyndication",
    "adsbygoogle",

    // Campaign tagging
    "utm_source=",
    "utm_medium=",
    "utm_campaign=",
];

/// Click-identifier query parameters
pub const TRACKING_PARAMS: &[&str] = &[
    "gclid=",
    "fbclid=",
    "msclkid=",
    "dclid=",
    "yclid=",
    "twclid=",
    "ttclid=",
    "mc_eid=",
    "_hsenc=",
    "igshid=",
];

/// Which table produced a hardcoded match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardcodedMatch {
    Domain(&'static str),
    Keyword(&'static str),
    TrackingParam(&'static str),
}

/// Static fallback matcher
#[derive(Debug, Clone, Copy, Default)]
pub struct HardcodedFilters;

impl HardcodedFilters {
    /// Check if a URL should be blocked
    pub fn should_block(url: &str) -> bool {
        Self::check(url).is_some()
    }

    /// Check a URL and report which entry matched.
    ///
    /// Lower-cases once, then tests the host against the domain table and
    /// the whole URL against the keyword and parameter tables.
    pub fn check(url: &str) -> Option<HardcodedMatch> {
        if url.is_empty() {
            return None;
        }
        let url = url.to_lowercase();

        if let Some(host) = host_of(&url) {
            if let Some(domain) = HARDCODED_DOMAINS
                .iter()
                .copied()
                .find(|domain| is_subdomain_of(host, domain))
            {
                return Some(HardcodedMatch::Domain(domain));
            }
        }

        if let Some(keyword) = HARDCODED_KEYWORDS.iter().copied().find(|k| url.contains(k)) {
            return Some(HardcodedMatch::Keyword(keyword));
        }

        TRACKING_PARAMS
            .iter()
            .copied()
            .find(|param| url.contains(param))
            .map(HardcodedMatch::TrackingParam)
    }

    /// The domain table, for seeding engines
    pub fn domains() -> &'static [&'static str] {
        HARDCODED_DOMAINS
    }

    pub fn keywords() -> &'static [&'static str] {
        HARDCODED_KEYWORDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_domain_table_size_and_uniqueness() {
        let unique: HashSet<&str> = HARDCODED_DOMAINS.iter().copied().collect();
        assert_eq!(unique.len(), HARDCODED_DOMAINS.len(), "duplicate hardcoded domain");
        assert!(HARDCODED_DOMAINS.len() >= 500);
    }

    #[test]
    fn test_domain_table_is_normalized() {
        for domain in HARDCODED_DOMAINS {
            assert_eq!(*domain, domain.to_lowercase());
            assert!(!domain.contains('/'), "{} is not a hostname", domain);
            assert!(domain.contains('.'));
        }
    }

    #[test]
    fn test_blocks_ad_domains() {
        assert!(HardcodedFilters::should_block("https://doubleclick.net/ad.js"));
        assert!(HardcodedFilters::should_block(
            "https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js"
        ));
        assert!(HardcodedFilters::should_block("https://www.Google-Analytics.com/analytics.js"));
        assert_eq!(
            HardcodedFilters::check("https://sub.criteo.com/x"),
            Some(HardcodedMatch::Domain("criteo.com"))
        );
    }

    #[test]
    fn test_blocks_tracking_paths() {
        assert!(HardcodedFilters::should_block("https://example.com/ads/banner.js"));
        assert!(HardcodedFilters::should_block("https://example.com/tracking/pixel.gif"));
        assert!(HardcodedFilters::should_block("https://example.com/?utm_source=test"));
        assert_eq!(
            HardcodedFilters::check("https://shop.example/item?gclid=abc"),
            Some(HardcodedMatch::TrackingParam("gclid="))
        );
        assert!(HardcodedFilters::should_block("https://news.example/a?FBCLID=1"));
    }

    #[test]
    fn test_allows_normal_urls() {
        assert!(!HardcodedFilters::should_block("https://www.google.com"));
        assert!(!HardcodedFilters::should_block("https://github.com"));
        assert!(!HardcodedFilters::should_block("https://docs.rs/regex"));
        assert!(!HardcodedFilters::should_block("https://notcriteo.com/x"));
    }

    #[test]
    fn test_malformed_input() {
        assert!(!HardcodedFilters::should_block(""));
        assert!(!HardcodedFilters::should_block("://x"));
        assert!(!HardcodedFilters::should_block("not-a-url"));
    }
}
